//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the control
//! plane. All types derive Serde traits for deserialization from TOML.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlConfig {
    /// Where generated proxy files live.
    pub paths: PathsConfig,

    /// Proxy test and reload commands.
    pub nginx: NginxConfig,

    /// Firewall tools used for connection resets.
    pub firewall: FirewallConfig,

    /// Appliance identity, certificates and port pools.
    pub appliance: ApplianceConfig,

    /// Auth sidecar layout.
    pub sidecar: SidecarConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// File layout of the proxy installation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// One virtual host file per domain.
    pub conf_dir: PathBuf,

    /// One subdirectory of location fragments per domain.
    pub locations_dir: PathBuf,

    /// One file per stream service.
    pub stream_dir: PathBuf,

    /// Per-domain access/error logs.
    pub logs_dir: PathBuf,

    /// Static page served by a domain's default location.
    pub default_pages: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            conf_dir: PathBuf::from("/etc/nginx/conf.d"),
            locations_dir: PathBuf::from("/etc/nginx/locations"),
            stream_dir: PathBuf::from("/etc/nginx/stream.d"),
            logs_dir: PathBuf::from("/var/log/nginx"),
            default_pages: PathBuf::from("/etc/nginx/default_pages"),
        }
    }
}

/// Proxy process control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NginxConfig {
    /// Tests the whole configuration tree.
    pub test_command: String,

    /// Graceful reload.
    pub reload_command: String,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            test_command: "nginx -t".to_string(),
            reload_command: "nginx -s reload".to_string(),
        }
    }
}

/// Tools used to evict stale backend connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FirewallConfig {
    pub iptables: String,
    pub conntrack: String,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            iptables: "iptables".to_string(),
            conntrack: "conntrack".to_string(),
        }
    }
}

/// Inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Appliance identity and resource pools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplianceConfig {
    /// Public address. Domains resolving here get certbot certificates.
    pub public_address: Option<String>,

    /// Self-signed certificates, one directory per name.
    pub self_signed_dir: PathBuf,

    /// Certbot's `live` directory.
    pub certbot_live_dir: PathBuf,

    /// Registration email for certbot. Registers without one when unset.
    pub certbot_email: Option<String>,

    /// Local ports handed to auth sidecars.
    pub auth_ports: PortRange,

    /// Listen ports handed to stream services created without one.
    pub stream_ports: PortRange,

    /// Backend reachability probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            public_address: None,
            self_signed_dir: PathBuf::from("/etc/nginx/ssl"),
            certbot_live_dir: PathBuf::from("/etc/letsencrypt/live"),
            certbot_email: None,
            auth_ports: PortRange { start: 4180, end: 4279 },
            stream_ports: PortRange { start: 20000, end: 20999 },
            probe_timeout_ms: 3000,
        }
    }
}

/// Auth sidecar (oauth2-proxy under supervisord) layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SidecarConfig {
    pub binary: PathBuf,

    /// Cookie secrets, mode 0600.
    pub cookie_dir: PathBuf,

    /// Allowed email lists.
    pub emails_dir: PathBuf,

    /// supervisord program files.
    pub supervisor_dir: PathBuf,

    /// Applies pending supervisord program changes.
    pub update_command: String,

    /// Provider flags appended to every sidecar command line
    /// (client id, provider name, ...).
    pub extra_args: Vec<String>,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/usr/local/bin/oauth2-proxy"),
            cookie_dir: PathBuf::from("/data/oauth2"),
            emails_dir: PathBuf::from("/opt/oauth2-proxy"),
            supervisor_dir: PathBuf::from("/etc/supervisor/conf.d"),
            update_command: "supervisorctl reread && supervisorctl update".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
