//! IP / CIDR allow and deny lists.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Network access rules attached to a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessList {
    /// Addresses or subnets allowed in. A non-empty list denies everyone else.
    pub allow: Vec<String>,

    /// Addresses or subnets always rejected.
    pub deny: Vec<String>,
}

impl AccessList {
    pub fn is_open(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    /// Reject entries that are neither an IP literal nor a CIDR subnet.
    pub fn validate(&self) -> ControlResult<()> {
        for (field, entries) in [("allowed_ips", &self.allow), ("blocked_ips", &self.deny)] {
            if let Some(bad) = entries.iter().find(|e| !is_ip_or_cidr(e)) {
                return Err(ControlError::validation(
                    field,
                    format!("`{bad}` is not an IP address or CIDR subnet"),
                ));
            }
        }
        Ok(())
    }
}

/// True when `value` parses as an IPv4 or IPv6 address.
pub fn is_ip_literal(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

/// True for an IP literal or an `address/prefix` subnet.
pub fn is_ip_or_cidr(value: &str) -> bool {
    match value.split_once('/') {
        Some((addr, prefix)) => {
            let Ok(addr) = addr.parse::<IpAddr>() else {
                return false;
            };
            let max = if addr.is_ipv4() { 32 } else { 128 };
            prefix.parse::<u8>().map(|p| p <= max).unwrap_or(false)
        }
        None => is_ip_literal(value),
    }
}
