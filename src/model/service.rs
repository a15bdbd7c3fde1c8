//! HTTP path services and TCP/UDP stream services.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};
use crate::model::access::{is_ip_literal, AccessList};
use crate::model::domain::validate_host_name;
use crate::model::identifier::Identifier;
use crate::model::node::Node;

/// Scheme used to talk to an HTTP backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendScheme {
    #[default]
    Http,
    Https,
}

impl BackendScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_encrypted(self) -> bool {
        matches!(self, Self::Https)
    }
}

/// Transport of a stream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    #[default]
    Tcp,
    Udp,
}

impl StreamProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for StreamProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a service forwards traffic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Backend {
    pub node: Node,

    /// Host override, honoured only for gateway and local nodes.
    #[serde(default)]
    pub host: Option<String>,

    pub port: u16,
}

/// Backend host after applying node rules, plus the DNS server to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBackend {
    pub host: String,
    pub port: u16,
    /// Set when `host` must be resolved through the gateway node.
    pub resolver: Option<String>,
}

impl Backend {
    /// Pick the host to proxy to.
    ///
    /// Gateway and local nodes may name a different host behind them. A
    /// non-literal host behind a gateway only resolves through the gateway's
    /// own DNS, so the node address is returned as resolver.
    pub fn resolve(&self) -> ResolvedBackend {
        let override_host = self
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .filter(|_| self.node.is_gateway || self.node.is_local);

        match override_host {
            Some(host) => ResolvedBackend {
                host: host.to_string(),
                port: self.port,
                resolver: (self.node.is_gateway && !is_ip_literal(host))
                    .then(|| self.node.address.clone()),
            },
            None => ResolvedBackend {
                host: self.node.address.clone(),
                port: self.port,
                resolver: None,
            },
        }
    }

    fn validate(&self) -> ControlResult<()> {
        if self.port == 0 {
            return Err(ControlError::validation("backend_port", "port must be non-zero"));
        }
        if let Some(host) = self.host.as_deref().filter(|h| !h.is_empty()) {
            if !is_ip_literal(host) {
                validate_host_name(host)
                    .map_err(|_| ControlError::validation("backend_host", format!("`{host}` is not a valid host")))?;
            }
        }
        Ok(())
    }
}

fn root_path() -> String {
    "/".to_string()
}

fn enabled_by_default() -> bool {
    true
}

/// A path-scoped backend binding under a domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpService {
    #[serde(default)]
    pub id: u64,

    /// Bound host name. `None` binds to the catch-all server.
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default = "root_path")]
    pub path: String,

    pub backend: Backend,

    #[serde(default)]
    pub scheme: BackendScheme,

    #[serde(default)]
    pub access: AccessList,

    #[serde(default)]
    pub require_auth: bool,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    pub identifier: Identifier,
}

impl HttpService {
    pub fn validate(&self) -> ControlResult<()> {
        validate_location_path(&self.path)?;
        if let Some(domain) = &self.domain {
            validate_host_name(domain)?;
        }
        self.backend.validate()?;
        self.access.validate()
    }

    /// Apply a partial update. `node` is the resolved node when the update
    /// moves the service to another node.
    pub fn apply(&mut self, update: HttpServiceUpdate, node: Option<Node>) {
        if let Some(domain) = update.domain {
            self.domain = Some(domain);
        }
        if let Some(path) = update.path {
            self.path = path;
        }
        if let Some(node) = node {
            self.backend.node = node;
        }
        if let Some(host) = update.backend_host {
            self.backend.host = Some(host);
        }
        if let Some(port) = update.backend_port {
            self.backend.port = port;
        }
        if let Some(scheme) = update.scheme {
            self.scheme = scheme;
        }
        if let Some(access) = update.access {
            self.access = access;
        }
        if let Some(require_auth) = update.require_auth {
            self.require_auth = require_auth;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
    }
}

/// Request to create an HTTP service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpServiceRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "root_path")]
    pub path: String,
    pub node_id: u64,
    #[serde(default)]
    pub backend_host: Option<String>,
    pub backend_port: u16,
    #[serde(default)]
    pub scheme: BackendScheme,
    #[serde(default)]
    pub access: AccessList,
    #[serde(default)]
    pub require_auth: bool,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl HttpServiceRequest {
    pub fn into_service(self, node: Node, identifier: Identifier) -> HttpService {
        HttpService {
            id: 0,
            domain: self.domain,
            path: self.path,
            backend: Backend {
                node,
                host: self.backend_host,
                port: self.backend_port,
            },
            scheme: self.scheme,
            access: self.access,
            require_auth: self.require_auth,
            enabled: self.enabled,
            identifier,
        }
    }
}

/// Partial update of an HTTP service. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpServiceUpdate {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub node_id: Option<u64>,
    pub backend_host: Option<String>,
    pub backend_port: Option<u16>,
    pub scheme: Option<BackendScheme>,
    pub access: Option<AccessList>,
    pub require_auth: Option<bool>,
    pub enabled: Option<bool>,
}

/// A port-scoped stream binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TcpService {
    #[serde(default)]
    pub id: u64,

    /// Listen port, unique across stream services.
    pub port: u16,

    #[serde(default)]
    pub protocol: StreamProtocol,

    /// Bound host name, used for certificate reuse and log placement.
    #[serde(default)]
    pub domain: Option<String>,

    pub backend: Backend,

    /// Terminate TLS at the stream layer.
    #[serde(default)]
    pub ssl: bool,

    #[serde(default)]
    pub access: AccessList,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    pub identifier: Identifier,
}

impl TcpService {
    pub fn validate(&self) -> ControlResult<()> {
        if self.port == 0 {
            return Err(ControlError::validation("port", "listen port must be non-zero"));
        }
        if self.ssl && self.protocol == StreamProtocol::Udp {
            return Err(ControlError::validation(
                "ssl",
                "TLS termination is only available for TCP services",
            ));
        }
        if let Some(domain) = &self.domain {
            validate_host_name(domain)?;
        }
        self.backend.validate()?;
        self.access.validate()
    }

    pub fn apply(&mut self, update: TcpServiceUpdate, node: Option<Node>) {
        if let Some(port) = update.port {
            self.port = port;
        }
        if let Some(protocol) = update.protocol {
            self.protocol = protocol;
        }
        if let Some(domain) = update.domain {
            self.domain = Some(domain);
        }
        if let Some(node) = node {
            self.backend.node = node;
        }
        if let Some(host) = update.backend_host {
            self.backend.host = Some(host);
        }
        if let Some(port) = update.backend_port {
            self.backend.port = port;
        }
        if let Some(ssl) = update.ssl {
            self.ssl = ssl;
        }
        if let Some(access) = update.access {
            self.access = access;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
    }
}

/// Request to create a stream service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TcpServiceRequest {
    /// Listen port. Reserved from the store when omitted.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: StreamProtocol,
    #[serde(default)]
    pub domain: Option<String>,
    pub node_id: u64,
    #[serde(default)]
    pub backend_host: Option<String>,
    pub backend_port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub access: AccessList,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl TcpServiceRequest {
    /// `port` is the listen port: the requested one or a reserved one.
    pub fn into_service(self, node: Node, port: u16, identifier: Identifier) -> TcpService {
        TcpService {
            id: 0,
            port,
            protocol: self.protocol,
            domain: self.domain,
            backend: Backend {
                node,
                host: self.backend_host,
                port: self.backend_port,
            },
            ssl: self.ssl,
            access: self.access,
            enabled: self.enabled,
            identifier,
        }
    }
}

/// Partial update of a stream service. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TcpServiceUpdate {
    pub port: Option<u16>,
    pub protocol: Option<StreamProtocol>,
    pub domain: Option<String>,
    pub node_id: Option<u64>,
    pub backend_host: Option<String>,
    pub backend_port: Option<u16>,
    pub ssl: Option<bool>,
    pub access: Option<AccessList>,
    pub enabled: Option<bool>,
}

/// Location paths become part of a `location` header and a file name.
pub fn validate_location_path(path: &str) -> ControlResult<()> {
    let valid = path.starts_with('/')
        && !path.contains("..")
        && !path
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | ';' | '"' | '\'' | '\\'));

    if valid {
        Ok(())
    } else {
        Err(ControlError::validation(
            "path",
            format!("`{path}` is not a valid location path"),
        ))
    }
}
