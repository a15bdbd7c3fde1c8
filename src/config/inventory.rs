//! Inventory file: the declarative records the `sync` and `watch` commands
//! reconcile when no external store is attached.
//!
//! ```toml
//! [[nodes]]
//! id = 1
//! name = "edge"
//! address = "10.8.0.2"
//! is_gateway = true
//! wg_interface = "wg0"
//!
//! [[domains]]
//! name = "app.example.com"
//! ssl = "self-signed"
//!
//! [[http_services]]
//! identifier = "app_root"
//! domain = "app.example.com"
//! node_id = 1
//! backend_port = 8080
//!
//! [[tcp_services]]
//! identifier = "pg"
//! port = 15432
//! node_id = 1
//! backend_port = 5432
//! ```

use serde::{Deserialize, Serialize};

use crate::model::{DomainRequest, HttpServiceRequest, Identifier, Node, TcpServiceRequest};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Inventory {
    pub nodes: Vec<Node>,
    pub domains: Vec<DomainRequest>,
    pub http_services: Vec<HttpServiceEntry>,
    pub tcp_services: Vec<TcpServiceEntry>,
}

/// HTTP service with a fixed identifier, so files keep their names between
/// syncs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServiceEntry {
    pub identifier: Identifier,
    #[serde(flatten)]
    pub service: HttpServiceRequest,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TcpServiceEntry {
    pub identifier: Identifier,
    #[serde(flatten)]
    pub service: TcpServiceRequest,
}
