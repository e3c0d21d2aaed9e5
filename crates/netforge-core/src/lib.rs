// netforge-core: the topology state engine.
//
// A topology is one JSON document plus the OS resources it describes.
// Commands are short-lived processes that load the document under a
// cross-process lock, mutate it, drive the OS to match, and persist --
// there is no long-running coordinator. Crash-safety comes from ordering
// alone: records are written before their OS resources exist and removed
// after the OS resources are gone, and every delete is idempotent.

pub mod addr;
pub mod context;
pub mod error;
pub mod ident;
pub mod lock;
pub mod model;
pub mod ops;
pub mod pool;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use context::Context;
pub use error::{CoreError, OpOutput, Presence};
pub use lock::{LockDomain, LockGuard, LockManager};
pub use store::{DocStore, IspStore, StateStore};

pub use model::{
    // Entities
    Interface, Link, Network, NetworkState, NetworkType, Node, NodeType,
    // Documents
    GlobalSection, IspDocument, IspSlot, StateDocument,
    // Supporting records
    InternetRecord, ProcessRecord, RouteRecord,
};
