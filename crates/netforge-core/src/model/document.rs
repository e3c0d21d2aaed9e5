// ── State documents ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Link, Network, Node};

/// The root of the per-topology state document.
///
/// Absent containers materialize as empty on load (the normal bootstrap
/// path); a file that exists but fails to parse is rejected upstream, never
/// silently reinitialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub node: BTreeMap<String, Node>,

    #[serde(default)]
    pub network: BTreeMap<String, Network>,

    #[serde(default)]
    pub link: BTreeMap<String, Link>,

    /// Short code -> long id.
    #[serde(default)]
    pub identifiers: BTreeMap<String, IdentityRecord>,

    /// Long id -> short code (reverse of `identifiers`).
    #[serde(default)]
    pub netns: BTreeMap<String, String>,

    #[serde(default)]
    pub global: GlobalSection,
}

impl StateDocument {
    /// True when no nodes, networks, or links exist.
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.network.is_empty() && self.link.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSection {
    /// Nameservers propagated into every node's resolv.conf.
    #[serde(rename = "DNS", default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,

    /// ISP id -> active Internet connection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub internet: BTreeMap<String, InternetRecord>,
}

/// One node's connection to the simulated Internet uplink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternetRecord {
    pub node_id: String,
    /// Node-side veth end of the uplink.
    pub node_link: String,
    /// Bridge-side veth end of the uplink.
    pub host_link: String,
    pub isp_addr: String,
    pub isp_index: u32,
    pub isp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iface: Option<String>,
}
