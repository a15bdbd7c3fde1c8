//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ControlConfig (validated, immutable)
//!     → shared by reference with every orchestrator at construction
//!
//! inventory.toml
//!     → loader.rs (parse)
//!     → store seeding (record validation)
//!
//! On inventory change:
//!     watcher.rs detects change
//!     → loader.rs loads new inventory
//!     → lifecycle re-seeds stores and re-synchronizes
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod inventory;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use inventory::Inventory;
pub use schema::{
    ApplianceConfig, ControlConfig, FirewallConfig, NginxConfig, ObservabilityConfig, PathsConfig,
    PortRange, SidecarConfig,
};
