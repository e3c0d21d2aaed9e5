// ── Topology orchestrators ──
//
// One module per operation, all following the same machine:
//
//   add:    pre-check -> state record -> persist -> OS create -> post-check
//   delete: pre-check -> OS remove (skipped when already gone) -> post-check
//           -> state removal (incl. dangling references) -> persist
//
// State is written before the OS resource exists and removed after the OS
// resource is gone, so a kill at any point leaves a visible record rather
// than an invisible leak. Composite operations call lower-level ones as
// library functions and re-read the store afterward -- the nested call
// commits under its own (re-entrant) lock scope.

pub mod probe;

mod dns;
mod internet;
mod link_add;
mod link_delete;
mod network_add;
mod network_address;
mod network_delete;
mod network_route;
mod network_state;
mod node_add;
mod node_address;
mod node_delete;
mod node_join;
mod node_leave;
mod node_route;
mod process;
mod state_delete;

pub use dns::{DnsOptions, dns};
pub use internet::{InternetOptions, internet_connect, internet_disconnect};
pub use link_add::{LinkAddOptions, link_add};
pub use link_delete::link_delete;
pub use network_add::{NetworkAddOptions, network_add};
pub use network_address::{NetworkAddressOptions, network_address};
pub use network_delete::network_delete;
pub use network_route::{NetworkRouteOptions, network_route};
pub use network_state::network_state;
pub use node_add::{NodeAddOptions, node_add};
pub use node_address::{NodeAddressOptions, node_address};
pub use node_delete::node_delete;
pub use node_join::{NodeJoinOptions, node_join};
pub use node_leave::node_leave;
pub use node_route::{NodeRouteOptions, node_route};
pub use process::{
    ProcessStartOptions, ProcessWaitOptions, process_start, process_stop, process_wait,
};
pub use state_delete::state_delete;

use crate::addr;
use crate::context::Context;
use crate::error::CoreError;
use crate::model::StateDocument;

pub(crate) fn validation(field: &str, reason: impl Into<String>) -> CoreError {
    CoreError::Validation {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// IPv6 interface identifier for one node interface: the customized
/// EUI-64 when one was fixed at join time, otherwise derived from the
/// interface's hardware address.
pub(crate) fn interface_iid(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
    interface: &str,
) -> Result<Option<String>, CoreError> {
    let customized = doc
        .node(node_id)
        .and_then(|node| node.interface.get(interface))
        .and_then(|iface| iface.customized_eui64.clone());

    let eui = match customized {
        Some(eui) => Some(eui),
        None => probe::node_hw_address(ctx, doc, node_id, interface)?
            .and_then(|hw| addr::mac48_to_eui64(&hw)),
    };

    Ok(eui.as_deref().and_then(addr::eui64_to_iid))
}
