//! Detach a node from one network, or from all of them.
//!
//! Takes no lock of its own: the underlying link deletions each commit
//! under their own lock scope, exactly as they would if issued singly.

use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::ops::{self, probe, validation};

pub fn node_leave(
    ctx: &Context,
    node_id: &str,
    network_id: Option<&str>,
) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let mut doc = store.load()?;

    // ── pre-check ────────────────────────────────────────────────────
    if node_id.is_empty() {
        return Err(validation("node_id", "missing name of the leaving virtual node"));
    }
    if !probe::node_exists(ctx, &mut doc, node_id)? {
        return Err(CoreError::MissingResource {
            entity: "node",
            id: node_id.to_owned(),
        });
    }
    if let Some(network_id) = network_id {
        if !probe::network_exists(ctx, &mut doc, network_id)? {
            return Err(CoreError::MissingResource {
                entity: "network",
                id: network_id.to_owned(),
            });
        }
    }

    // ── leave ────────────────────────────────────────────────────────
    let links_to_delete = match network_id {
        Some(network_id) => doc.shared_link_ids(node_id, network_id),
        None => doc.node_link_ids(node_id),
    };
    for link_id in links_to_delete {
        ops::link_delete(ctx, &link_id)?;
    }

    // ── post-check ───────────────────────────────────────────────────
    let doc = store.load()?;
    for link_id in doc.node_link_ids(node_id) {
        let still_shared = match network_id {
            Some(network_id) => doc.network_link_ids(network_id).contains(&link_id),
            None => true,
        };
        if still_shared {
            return Err(CoreError::Consistency {
                message: format!(
                    "node '{node_id}' failed to leave: link '{link_id}' still attached"
                ),
            });
        }
    }

    Ok(OpOutput::empty())
}
