//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port pools, timeouts)
//! - Detect conflicting port pools
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControlConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::config::schema::{ControlConfig, PortRange};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ControlConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let paths = [
        ("paths.conf_dir", &config.paths.conf_dir),
        ("paths.locations_dir", &config.paths.locations_dir),
        ("paths.stream_dir", &config.paths.stream_dir),
        ("paths.logs_dir", &config.paths.logs_dir),
        ("paths.default_pages", &config.paths.default_pages),
        ("appliance.self_signed_dir", &config.appliance.self_signed_dir),
        ("appliance.certbot_live_dir", &config.appliance.certbot_live_dir),
    ];
    for (field, path) in paths {
        if !path.is_absolute() {
            errors.push(ValidationError::new(field, "must be an absolute path"));
        }
    }

    for (field, command) in [
        ("nginx.test_command", &config.nginx.test_command),
        ("nginx.reload_command", &config.nginx.reload_command),
    ] {
        if command.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }

    check_range("appliance.auth_ports", &config.appliance.auth_ports, &mut errors);
    check_range("appliance.stream_ports", &config.appliance.stream_ports, &mut errors);
    if config.appliance.auth_ports.overlaps(&config.appliance.stream_ports) {
        errors.push(ValidationError::new(
            "appliance.stream_ports",
            "overlaps appliance.auth_ports",
        ));
    }

    if config.appliance.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("appliance.probe_timeout_ms", "must be > 0"));
    }

    if let Some(addr) = &config.appliance.public_address {
        if addr.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::new(
                "appliance.public_address",
                format!("`{addr}` is not an IP address"),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_range(field: &str, range: &PortRange, errors: &mut Vec<ValidationError>) {
    if range.start == 0 || range.start > range.end {
        errors.push(ValidationError::new(
            field,
            format!("invalid range {}-{}", range.start, range.end),
        ));
    }
}
