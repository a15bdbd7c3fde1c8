//! Proxy-side plumbing: where files go and how they become live.
//!
//! # Data Flow
//! ```text
//! rendered text
//!     → files.rs (write under layout.rs paths)
//!     → activate.rs (`nginx -t` over the whole tree)
//!         → pass: optional `nginx -s reload`
//!         → fail: rename to `*.err`
//!
//! service removal → reset.rs (iptables + conntrack, best effort)
//! operator        → quarantine.rs (list outstanding `*.err` files)
//! ```
//!
//! # Design Decisions
//! - The config test is global; a failure is attributed to the file just written
//! - Quarantine is an outcome, not an error
//! - Connection reset never fails the surrounding mutation

pub mod activate;
pub mod files;
pub mod layout;
pub mod quarantine;
pub mod reset;

pub use activate::{Activation, ProxyControl};
pub use layout::{location_name, ConfLayout, QUARANTINE_SUFFIX};
pub use quarantine::{sweep, QuarantineReport};
pub use reset::ConnectionReset;
