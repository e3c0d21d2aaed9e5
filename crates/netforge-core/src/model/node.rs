// ── Node records ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Special node roles. `Plain` is the unremarkable default: an isolated
/// namespace with no extra behavior.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeType {
    /// Access point: IPv4/IPv6 forwarding enabled at creation.
    Ap,
    /// Backend service host.
    Service,
    /// The host computer itself -- commands run without namespace scoping,
    /// and no namespace is ever created or deleted for it.
    Local,
    #[default]
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    Plain,
}

impl NodeType {
    pub fn is_local(self) -> bool {
        self == Self::Local
    }
}

/// A virtual node: one network namespace plus its bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type", default)]
    pub node_type: NodeType,

    /// Interface name -> interface record.
    #[serde(default)]
    pub interface: BTreeMap<String, Interface>,

    /// Route destination (suffixed `_v4`/`_v6`) -> route record.
    #[serde(default)]
    pub route: BTreeMap<String, super::RouteRecord>,

    /// Tmux session records, kept only so delete can account for them.
    #[serde(default)]
    pub tmux: BTreeMap<String, TmuxRecord>,

    /// Daemon tag -> process record.
    #[serde(default)]
    pub process: BTreeMap<String, ProcessRecord>,
}

impl Node {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            ..Self::default()
        }
    }

    /// Ids of the links this node's interfaces are attached to, sorted.
    pub fn link_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .interface
            .values()
            .filter_map(|iface| iface.link.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// One interface inside a node's namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    /// Owning link id; None for unmanaged interfaces (e.g. service tunnels).
    pub link: Option<String>,

    #[serde(rename = "type")]
    pub link_type: super::NetworkType,

    /// Address -> mask record.
    #[serde(default)]
    pub ip: BTreeMap<String, AddressRecord>,

    /// Fixed EUI-64 requested at join time, dash-separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customized_eui64: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub mask: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmuxRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<String>,
}

/// A managed daemon. The pid alone is not identity -- `create_time` is the
/// kernel start tick and must match before any signal is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: i32,
    pub create_time: u64,
    /// Captured stdout/stderr file.
    pub out: String,
    pub command: String,
    pub started_at: DateTime<Utc>,
}
