//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrators and the activation protocol produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (test/reload/reset counters, quarantine gauge)
//!
//! Consumers:
//!     → stdout (supervisor log capture)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event, never interpolated messages
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
