//! Delete a virtual link and clear every reference to it.

use tracing::warn;

use crate::context::Context;
use crate::error::{CoreError, OpOutput, Presence};
use crate::lock::LockDomain;
use crate::ops::{probe, validation};

pub fn link_delete(ctx: &Context, link_id: &str) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;

    // ── pre-check ────────────────────────────────────────────────────
    if link_id.is_empty() {
        return Err(validation("link_id", "missing name of the virtual link to delete"));
    }

    let presence = if probe::link_exists(ctx, &mut doc, link_id)? {
        Presence::Present
    } else {
        warn!("[{link_id}] virtual link does not exist");
        Presence::Missing
    };

    if !presence.is_missing() {
        if let Some(record) = doc.link(link_id).cloned() {
            // Deleting the network end takes the veth peer with it.
            let cmd = ctx.as_root(&format!("ip link delete {}", record.network_end));
            match record.network.as_deref() {
                Some(network_id) => {
                    let network_id = network_id.to_owned();
                    ctx.run_at_network(&mut doc, &network_id, &cmd)?;
                }
                None => {
                    ctx.run_host(&cmd)?;
                }
            }

            if record.tap {
                // The node-side bridge and tap are separate objects.
                let bridge = ctx.unique_prefix(&mut doc, &format!("{link_id}bridge"));
                let cmd = ctx.as_root(&format!("ip link delete {bridge}"));
                match record.node.as_deref() {
                    Some(node_id) => {
                        let node_id = node_id.to_owned();
                        ctx.run_at_node(&mut doc, &node_id, &cmd)?;

                        if let Some(iface) = doc.node_interface_for_link(&node_id, link_id) {
                            let cmd = ctx.as_root(&format!("ip link delete {iface}"));
                            ctx.run_at_node(&mut doc, &node_id, &cmd)?;
                        }
                    }
                    None => {
                        ctx.run_host(&cmd)?;
                        let cmd = ctx.as_root(&format!("ip link delete {}", record.node_end));
                        ctx.run_host(&cmd)?;
                    }
                }
            }
        } else {
            // No record: clean up leftover host interfaces by name.
            let host_links = probe::host_interfaces(ctx)?;
            let bare = ctx.unique_prefix(&mut doc, link_id);
            let node_end = ctx.unique_prefix(&mut doc, &format!("{link_id}node"));

            for name in [bare, node_end] {
                if host_links.contains(&name) {
                    let cmd = ctx.as_root(&format!("ip link delete {name}"));
                    ctx.run_host(&cmd)?;
                }
            }
        }

        // ── post-check ───────────────────────────────────────────────
        if probe::link_exists(ctx, &mut doc, link_id)? {
            return Err(CoreError::Consistency {
                message: format!("failed to delete virtual link '{link_id}'"),
            });
        }
    }

    // ── state removal: the record and every dangling reference ───────
    doc.purge_link(link_id);
    for name in [
        link_id.to_owned(),
        format!("{link_id}net"),
        format!("{link_id}node"),
        format!("{link_id}tap"),
        format!("{link_id}bridge"),
    ] {
        crate::ident::remove_identifier(&mut doc, &name);
    }
    store.save(&doc)?;

    Ok(OpOutput::empty())
}
