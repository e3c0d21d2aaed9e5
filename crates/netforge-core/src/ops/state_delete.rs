//! Tear down the whole topology and delete its state file.

use tracing::debug;

use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::ops;

pub fn state_delete(ctx: &Context) -> Result<OpOutput, CoreError> {
    // Clear locks abandoned by dead processes first. A lock held by a
    // live process refuses to break and fails the whole teardown -- this
    // command must not rip a topology out from under a running command.
    ctx.locks().break_all()?;

    let store = ctx.store();

    let mut doc = store.load()?;
    for node_id in doc.node_ids() {
        ops::node_delete(ctx, &node_id)?;
    }

    doc = store.load()?;
    for network_id in doc.network_ids() {
        ops::network_delete(ctx, &network_id)?;
    }

    doc = store.load()?;
    for link_id in doc.link_ids() {
        ops::link_delete(ctx, &link_id)?;
    }

    store.delete_file()?;
    debug!("topology state deleted");

    Ok(OpOutput::empty())
}
