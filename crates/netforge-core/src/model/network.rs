// ── Network records ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Network (and link/interface) media type.
///
/// The type decides the interface base name a joining node sees, so a
/// thread network hands out `wpan0`-style names and a wifi network
/// `wlan0`-style ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NetworkType {
    Thread,
    Wifi,
    Wan,
    Cellular,
    Internet,
    Tun,
    #[serde(rename = "out-of-band")]
    #[strum(serialize = "out-of-band")]
    OutOfBand,
}

impl NetworkType {
    /// Base name for node-side interfaces on this medium.
    pub fn interface_base(self) -> &'static str {
        match self {
            Self::Thread => "wpan",
            Self::Wifi => "wlan",
            Self::Wan => "eth",
            Self::Cellular => "ppp",
            Self::OutOfBand => "oob",
            Self::Internet | Self::Tun => "tun",
        }
    }
}

/// Administrative state of a network's bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum NetworkState {
    Up,
    #[default]
    Down,
}

/// A virtual network: one bridge inside its own namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    #[serde(rename = "type")]
    pub network_type: NetworkType,

    #[serde(default)]
    pub state: NetworkState,

    /// Prefix address -> mask. Nodes joining the network are assigned an
    /// address on every prefix.
    #[serde(default)]
    pub prefix: BTreeMap<String, PrefixRecord>,

    /// Routes replayed onto every member node (key suffixed `_v4`/`_v6`).
    #[serde(default)]
    pub route: BTreeMap<String, RouteRecord>,

    /// Link ids attached to this bridge. The record is empty -- membership
    /// is the information.
    #[serde(default)]
    pub interface: BTreeMap<String, MemberRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

impl Network {
    pub fn new(network_type: NetworkType) -> Self {
        Self {
            network_type,
            state: NetworkState::Down,
            prefix: BTreeMap::new(),
            route: BTreeMap::new(),
            interface: BTreeMap::new(),
            gateway: None,
        }
    }

    /// Attached link ids, sorted.
    pub fn link_ids(&self) -> Vec<String> {
        self.interface.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRecord {
    pub mask: u8,
}

/// A route: destination is the map key, these are the gateway parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}
