//! Record stores.
//!
//! # Data Flow
//! ```text
//! inventory.toml ──seed──▶ MemoryStore ◀──find/save/delete── services/*
//!                              │
//!                              └── reserve_auth_port / reserve_port
//!                                  (atomic allocators for global namespaces)
//! ```
//!
//! # Design Decisions
//! - Orchestrators depend on the traits only; persistence is pluggable
//! - Uniqueness of domain names, service identifiers, listen ports and
//!   location files is enforced on save
//! - Reservations are atomic per value, so two callers never get the same port

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::ControlResult;
use crate::model::{Domain, HttpService, Node, TcpService};

#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn find(&self, id: u64) -> ControlResult<Option<Domain>>;
    async fn find_by_name(&self, name: &str) -> ControlResult<Option<Domain>>;
    async fn all(&self) -> ControlResult<Vec<Domain>>;

    /// Insert or replace. A zero id is assigned a fresh one.
    async fn save(&self, domain: Domain) -> ControlResult<Domain>;
    async fn delete(&self, id: u64) -> ControlResult<()>;

    /// Reserve a free auth sidecar port.
    async fn reserve_auth_port(&self) -> ControlResult<u16>;
    async fn release_auth_port(&self, port: u16) -> ControlResult<()>;
}

#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn find(&self, id: u64) -> ControlResult<Option<Node>>;
}

#[async_trait]
pub trait HttpServiceStore: Send + Sync {
    async fn find(&self, id: u64) -> ControlResult<Option<HttpService>>;
    async fn all(&self) -> ControlResult<Vec<HttpService>>;
    async fn save(&self, service: HttpService) -> ControlResult<HttpService>;
    async fn delete(&self, id: u64) -> ControlResult<()>;
}

#[async_trait]
pub trait TcpServiceStore: Send + Sync {
    async fn find(&self, id: u64) -> ControlResult<Option<TcpService>>;
    async fn all(&self) -> ControlResult<Vec<TcpService>>;

    /// Insert or replace. Fails when another service listens on the port.
    async fn save(&self, service: TcpService) -> ControlResult<TcpService>;
    async fn delete(&self, id: u64) -> ControlResult<()>;

    /// Reserve a free listen port from the stream pool.
    async fn reserve_port(&self) -> ControlResult<u16>;

    /// Return a reserved port that no saved service ended up using.
    async fn release_port(&self, port: u16) -> ControlResult<()>;
}
