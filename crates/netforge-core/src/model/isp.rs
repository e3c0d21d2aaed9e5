// ── ISP pool records ──

use serde::{Deserialize, Serialize};

/// The per-ISP document, parallel to the main state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IspDocument {
    #[serde(default)]
    pub global_isp: GlobalIspSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalIspSection {
    /// The address pool; empty until the first connect initializes it.
    #[serde(default)]
    pub isp: Vec<IspSlot>,

    /// Firewall rules applied on the host for this ISP, recorded verbatim
    /// so disconnect can reverse exactly what connect did.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub firewall_rules: Vec<String>,
}

/// One slot of the 255-slot uplink address pool.
///
/// Slot 0 (`isp_index` 1) is reserved for the shared uplink bridge; the
/// remaining 254 are assignable to nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IspSlot {
    pub isp_addr: String,
    /// 1-based index; the pool array position is `isp_index - 1`.
    pub isp_index: u32,
    pub occupy: bool,
    pub isp_host_end: String,
    pub isp_node_end: String,
}
