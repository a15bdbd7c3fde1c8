//! Proxy configuration text synthesis.
//!
//! # Data Flow
//! ```text
//! block.rs (ordered directives + nested blocks)
//!     ├─▶ location.rs  → `location <path> { … }` fragments
//!     ├─▶ server.rs    → `server { … }` virtual hosts / stream servers
//!     └─▶ stream.rs    → `upstream <name> { … }` + stream servers
//! ```
//!
//! # Design Decisions
//! - Insertion order is emission order; nothing is sorted or deduplicated
//! - Builders only know directive names, never validate proxy grammar
//! - Identical inputs render byte-identical text, so rebuilds are idempotent

pub mod block;
pub mod location;
pub mod server;
pub mod stream;

pub use block::ConfBlock;
pub use location::LocationConf;
pub use server::ServerConf;
pub use stream::StreamConf;

use crate::model::AccessList;

/// Emit access rules: every deny entry, then every allow entry, then a
/// closing `deny all` when anything was allowed.
pub(crate) fn push_access(block: &mut ConfBlock, access: &AccessList) {
    for entry in &access.deny {
        block.add_directive("deny", entry.as_str());
    }
    for entry in &access.allow {
        block.add_directive("allow", entry.as_str());
    }
    if !access.allow.is_empty() {
        block.add_directive("deny", "all");
    }
}
