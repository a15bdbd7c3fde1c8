//! Declarative records the control plane reconciles.
//!
//! # Data Flow
//! ```text
//! Records (store) ──▶ services/* orchestrators ──▶ conf/* builders ──▶ files
//!
//! Domain ◀── referenced by ── HttpService / TcpService ── reference ──▶ Node
//! ```
//!
//! # Design Decisions
//! - Services reference domains by name and embed a resolved Node
//! - A Domain owns its certificate pair and auth sidecar port
//! - Identifiers are generated once and never change, because file names and
//!   proxy variables are derived from them

pub mod access;
pub mod domain;
pub mod identifier;
pub mod node;
pub mod service;

pub use access::AccessList;
pub use domain::{CertPair, Domain, DomainRequest, DomainUpdate, SslTermination};
pub use identifier::Identifier;
pub use node::Node;
pub use service::{
    Backend, BackendScheme, HttpService, HttpServiceRequest, HttpServiceUpdate, ResolvedBackend,
    StreamProtocol, TcpService, TcpServiceRequest, TcpServiceUpdate,
};
