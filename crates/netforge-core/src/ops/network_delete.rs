//! Delete a virtual network, its attached links, and its namespace.

use tracing::warn;

use crate::context::Context;
use crate::error::{CoreError, OpOutput, Presence};
use crate::lock::LockDomain;
use crate::ops::{self, probe, validation};

pub fn network_delete(ctx: &Context, network_id: &str) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;

    // ── pre-check ────────────────────────────────────────────────────
    if network_id.is_empty() {
        return Err(validation(
            "network_id",
            "missing name of the virtual network to delete",
        ));
    }

    let presence = if probe::network_exists(ctx, &mut doc, network_id)? {
        Presence::Present
    } else {
        warn!("[{network_id}] virtual network does not exist");
        Presence::Missing
    };

    if !presence.is_missing() {
        if let Err(err) = ops::network_state(ctx, network_id, false) {
            warn!("[{network_id}] bringing network down failed: {err}");
        }
        doc = store.load()?;

        // Attached links go through the link orchestrator so their node
        // sides are cleaned up too.
        for link_id in doc.network_link_ids(network_id) {
            ops::link_delete(ctx, &link_id)?;
        }
        doc = store.load()?;

        let prefix = ctx.unique_prefix(&mut doc, network_id);
        let cmd = ctx.as_root(&format!("brctl delbr {prefix}"));
        ctx.run_at_network(&mut doc, network_id, &cmd)?;

        let cmd = ctx.as_root(&format!("ip netns del {prefix}"));
        ctx.run_host(&cmd)?;

        // ── post-check ───────────────────────────────────────────────
        if probe::network_exists(ctx, &mut doc, network_id)? {
            return Err(CoreError::Consistency {
                message: format!("failed to delete virtual network '{network_id}'"),
            });
        }
    }

    // ── state removal ────────────────────────────────────────────────
    doc.network.remove(network_id);
    crate::ident::remove_identifier(&mut doc, network_id);
    store.save(&doc)?;

    Ok(OpOutput::empty())
}
