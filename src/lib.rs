//! Control plane for an nginx reverse-proxy appliance.
//!
//! Turns domain, HTTP service and TCP/UDP stream records into the proxy's
//! on-disk configuration, tests every file before it can go live and keeps
//! the running proxy in step (reload, connection reset).

// Configuration synthesis
pub mod conf;
pub mod model;
pub mod nginx;

// Orchestration
pub mod services;
pub mod store;

// Host capabilities
pub mod external;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::ControlConfig;
pub use error::{ControlError, ControlResult};
pub use lifecycle::Shutdown;
pub use services::{Adapters, Engine, Stores};
