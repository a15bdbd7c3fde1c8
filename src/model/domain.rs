//! Domains: host names terminated by the proxy.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// How TLS is terminated for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslTermination {
    #[default]
    SelfSigned,
    Certbot,
    None,
}

impl SslTermination {
    pub fn requires_tls(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfSigned => "self-signed",
            Self::Certbot => "certbot",
            Self::None => "none",
        }
    }
}

impl fmt::Display for SslTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate and key file paths produced by a certificate provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CertPair {
    pub certificate: PathBuf,
    pub key: PathBuf,
}

/// A host name with its TLS and auth settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Domain {
    /// Store-assigned id; zero until first saved.
    #[serde(default)]
    pub id: u64,

    /// Host name. Immutable after creation.
    pub name: String,

    #[serde(default)]
    pub ssl: SslTermination,

    /// Present once a certificate has been provisioned.
    #[serde(default)]
    pub cert_pair: Option<CertPair>,

    /// Local port of the auth sidecar, when authentication is enabled.
    #[serde(default)]
    pub auth_port: Option<u16>,

    /// Email patterns admitted by the auth sidecar.
    #[serde(default)]
    pub allowed_emails: Vec<String>,
}

impl Domain {
    pub fn new(name: impl Into<String>, ssl: SslTermination) -> Self {
        Self {
            id: 0,
            name: name.into(),
            ssl,
            cert_pair: None,
            auth_port: None,
            allowed_emails: Vec::new(),
        }
    }

    pub fn has_auth_sidecar(&self) -> bool {
        self.auth_port.is_some()
    }

    /// TLS is required but nothing has been provisioned yet.
    pub fn needs_certificate(&self) -> bool {
        self.ssl.requires_tls() && self.cert_pair.is_none()
    }
}

/// Request to create a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DomainRequest {
    pub name: String,
    #[serde(default)]
    pub ssl: SslTermination,
    /// Provision an auth sidecar in front of the domain.
    #[serde(default)]
    pub authentication: bool,
    #[serde(default)]
    pub allowed_emails: Vec<String>,
}

impl DomainRequest {
    pub fn new(name: impl Into<String>, ssl: SslTermination) -> Self {
        Self {
            name: name.into(),
            ssl,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ControlResult<()> {
        validate_host_name(&self.name)
    }

    /// Record for this request. `auth_port` is the reserved sidecar port
    /// when authentication was requested.
    pub fn into_domain(self, auth_port: Option<u16>) -> Domain {
        Domain {
            allowed_emails: self.allowed_emails,
            auth_port,
            ..Domain::new(self.name, self.ssl)
        }
    }
}

/// Partial update of a domain. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DomainUpdate {
    pub name: Option<String>,
    pub ssl: Option<SslTermination>,
    pub authentication: Option<bool>,
    pub allowed_emails: Option<Vec<String>>,
}

/// Host names end up in file names and in `server_name`, so only DNS
/// characters are accepted.
pub fn validate_host_name(name: &str) -> ControlResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 253
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '*');

    if valid {
        Ok(())
    } else {
        Err(ControlError::validation(
            "domain",
            format!("`{name}` is not a valid host name"),
        ))
    }
}
