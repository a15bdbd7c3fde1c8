//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Seed stores → Rebuild domains → HTTP → TCP → Reload once
//!
//! Watch (signals.rs + config watcher):
//!     Inventory change / SIGHUP → Prune removed records → Re-sync
//!     SIGTERM/SIGINT → Shutdown (shutdown.rs)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: domains first so services find their virtual hosts
//! - Bulk rebuilds never reload per resource
//! - Shutdown waits for an in-flight sync; there is nothing to drain

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{prune, resync, SyncReport};
