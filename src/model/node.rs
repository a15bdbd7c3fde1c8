//! Nodes hosting backends.

use serde::{Deserialize, Serialize};

/// A machine reachable from the appliance, usually over a WireGuard tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Node {
    pub id: u64,
    pub name: String,

    /// Tunnel address of the node.
    pub address: String,

    /// The node routes to other hosts and can resolve names on their behalf.
    #[serde(default)]
    pub is_gateway: bool,

    /// The node is the appliance itself.
    #[serde(default)]
    pub is_local: bool,

    /// Interface carrying traffic to the node.
    #[serde(default)]
    pub wg_interface: Option<String>,
}
