// ── Link records ──

use serde::{Deserialize, Serialize};

use super::NetworkType;

/// A virtual link: a veth pair (or tap + bridge + veth trio) with a node
/// end and a network end.
///
/// `node` and `network` are weak references by id -- a link can exist
/// unattached, and the delete orchestrators are responsible for clearing
/// dangling references from both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "type")]
    pub link_type: NetworkType,

    /// Allocation number; the link id is `<type><number>`.
    pub number: u32,

    pub node: Option<String>,
    pub network: Option<String>,

    /// OS-visible name of the node-side end.
    pub node_end: String,
    /// OS-visible name of the network-side end.
    pub network_end: String,

    /// L2 tap configuration (bridge at the node) instead of plain veth.
    pub tap: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hw_addr: Option<String>,
}

impl Link {
    /// The link id this record serializes under.
    pub fn id(&self) -> String {
        format!("{}{}", self.link_type, self.number)
    }
}
