// ── Domain model ──
//
// Tagged records for everything the state document holds. The on-disk JSON
// shape is part of the tool's contract (other processes and older topologies
// read it), so field names are pinned with serde attributes and maps are
// BTreeMaps for deterministic serialization.

mod document;
mod isp;
mod link;
mod network;
mod node;

pub use document::{GlobalSection, IdentityRecord, InternetRecord, StateDocument};
pub use isp::{GlobalIspSection, IspDocument, IspSlot};
pub use link::Link;
pub use network::{MemberRecord, Network, NetworkState, NetworkType, PrefixRecord, RouteRecord};
pub use node::{AddressRecord, Interface, Node, NodeType, ProcessRecord, TmuxRecord};
