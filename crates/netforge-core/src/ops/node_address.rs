//! Add or remove an IP address on a node interface.

use tracing::warn;

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::ops::{probe, validation};

pub struct NodeAddressOptions {
    pub node_id: String,
    pub interface: String,
    /// `addr` or `addr/mask`; the mask defaults per family.
    pub address: String,
    pub delete: bool,
}

pub fn node_address(ctx: &Context, opts: &NodeAddressOptions) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;
    let node_id = opts.node_id.as_str();
    let interface = opts.interface.as_str();

    // ── pre-check ────────────────────────────────────────────────────
    if node_id.is_empty() {
        return Err(validation("node_id", "missing name of the virtual node"));
    }
    if !probe::node_exists(ctx, &mut doc, node_id)? {
        warn!("[{node_id}] virtual node does not exist");
    }
    if interface.is_empty() {
        return Err(validation("interface", "missing name of the network interface"));
    }
    if !probe::node_interface_exists(ctx, &mut doc, node_id, interface)? {
        return Err(CoreError::MissingResource {
            entity: "interface",
            id: format!("{node_id}/{interface}"),
        });
    }
    if opts.address.is_empty() {
        return Err(validation("address", "missing IP address"));
    }

    let (ip_address, ip_mask) = addr::split_address_mask(&opts.address);
    let ip_address = addr::padding_zeros(&ip_address);

    let mut done = false;
    if opts.delete {
        let prefix = addr::get_prefix(&ip_address, ip_mask);
        if !doc
            .node_interface_prefixes(node_id, interface)
            .contains(&prefix)
        {
            warn!("[{node_id}] may not have any address on prefix {prefix}");
        }
    } else if doc
        .node_interface_addresses(node_id, interface)
        .contains(&ip_address)
    {
        warn!("[{node_id}] already has address {ip_address}");
        done = true;
    }

    if !done {
        // Tap nodes carry their stack behind the bridge (LwIP-style);
        // the kernel never sees their addresses.
        if !doc.is_tap_node(node_id) {
            let family = if addr::is_ipv6(&ip_address) { "-6 " } else { "" };
            let action = if opts.delete { "del" } else { "add" };
            let cmd = ctx.as_root(&format!(
                "ip {family}addr {action} {ip_address}/{ip_mask} dev {interface}"
            ));
            ctx.run_at_node(&mut doc, node_id, &cmd)?;

            if !opts.delete {
                probe::wait_for_dad(ctx, &mut doc, node_id)?;
            }

            // ── post-check ───────────────────────────────────────────
            let os_addresses =
                probe::node_interface_addresses(ctx, &mut doc, node_id, interface)?;
            let has_ip = os_addresses.contains(&ip_address);
            if !opts.delete && !has_ip {
                return Err(CoreError::Consistency {
                    message: format!(
                        "failed to add address {ip_address} to {node_id}/{interface}"
                    ),
                });
            }
            if opts.delete && has_ip {
                return Err(CoreError::Consistency {
                    message: format!(
                        "failed to delete address {ip_address} from {node_id}/{interface}"
                    ),
                });
            }
        }

        if opts.delete {
            doc.remove_node_ip_address(node_id, interface, &ip_address);
        } else {
            doc.set_node_ip_address(node_id, interface, &ip_address, ip_mask);
        }
        store.save(&doc)?;
    }

    Ok(OpOutput::empty())
}
