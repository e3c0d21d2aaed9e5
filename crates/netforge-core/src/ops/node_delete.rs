//! Delete a virtual node and everything it owns.
//!
//! Idempotent: a missing node is a warned no-op for the OS steps, but the
//! state record (and its identifier mappings) is still cleared.

use tracing::warn;

use crate::context::Context;
use crate::error::{CoreError, OpOutput, Presence};
use crate::ident;
use crate::lock::LockDomain;
use crate::ops::{self, probe, validation};

pub fn node_delete(ctx: &Context, node_id: &str) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;

    // ── pre-check ────────────────────────────────────────────────────
    if node_id.is_empty() {
        return Err(validation("node_id", "missing name of the virtual node to delete"));
    }

    let presence = if !probe::node_exists(ctx, &mut doc, node_id)?
        && !doc.node.contains_key(node_id)
    {
        warn!("[{node_id}] virtual node does not exist");
        Presence::Missing
    } else {
        Presence::Present
    };

    if !presence.is_missing() {
        // Owned processes first; a dead record is tolerated.
        let tags = doc
            .node(node_id)
            .map(|node| node.process.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        for tag in tags {
            if let Err(err) = ops::process_stop(ctx, node_id, &tag) {
                warn!("[{node_id}] stopping process '{tag}' failed: {err}");
            }
        }
        doc = store.load()?;

        // Then the interfaces: each shared link is deleted through the
        // link orchestrator, which commits under its own lock scope.
        for link_id in doc.node_link_ids(node_id) {
            ops::link_delete(ctx, &link_id)?;
        }
        doc = store.load()?;

        // Tmux session wrapping is out of scope; the records go with the
        // node record below.

        if !doc.is_local_node(node_id) {
            let prefix = ctx.unique_prefix(&mut doc, node_id);
            let cmd = ctx.as_root(&format!("ip netns del {prefix}"));
            ctx.run_host(&cmd)?;
        }

        // ── post-check ───────────────────────────────────────────────
        if !doc.is_local_node(node_id) && probe::node_exists(ctx, &mut doc, node_id)? {
            return Err(CoreError::Consistency {
                message: format!("failed to delete virtual node '{node_id}'"),
            });
        }
    }

    // ── state removal (after the OS resource is gone) ────────────────
    let prefix = ctx.unique_prefix(&mut doc, node_id);
    doc.node.remove(node_id);

    let ns_dir = ctx.config().nsroot.join(&prefix);
    if ns_dir.is_dir() {
        let cmd = ctx.as_root(&format!("rm -r {}", ns_dir.display()));
        ctx.run_host(&cmd)?;
    }

    ident::remove_identifier(&mut doc, node_id);
    store.save(&doc)?;

    Ok(OpOutput::empty())
}
