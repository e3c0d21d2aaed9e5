//! Assign or remove a prefix on a network.
//!
//! Every node already on the network gets (or loses) an address on the
//! prefix; the prefix record itself is then stored so later joins assign
//! from it too.

use tracing::warn;

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::ops::{self, probe, validation};

pub struct NetworkAddressOptions {
    pub network_id: String,
    /// `prefix` or `prefix/mask`; the mask defaults per family.
    pub address: String,
    pub delete: bool,
}

pub fn network_address(ctx: &Context, opts: &NetworkAddressOptions) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let mut doc = store.load()?;
    let network_id = opts.network_id.as_str();

    // ── pre-check ────────────────────────────────────────────────────
    if network_id.is_empty() {
        return Err(validation("network_id", "missing name of the virtual network"));
    }
    if !probe::network_exists(ctx, &mut doc, network_id)? {
        return Err(CoreError::MissingResource {
            entity: "network",
            id: network_id.to_owned(),
        });
    }
    if opts.address.is_empty() {
        return Err(validation("address", "missing IP prefix"));
    }

    let (prefix_addr, mask) = addr::split_address_mask(&opts.address);
    let prefix = addr::get_prefix(&prefix_addr, mask);
    if prefix.is_empty() {
        return Err(validation(
            "address",
            format!("did not understand address format '{}'", opts.address),
        ));
    }

    if opts.delete
        && !doc
            .network(network_id)
            .is_some_and(|network| network.prefix.contains_key(&prefix))
    {
        warn!("[{network_id}] network may not have prefix {prefix}");
    }

    // ── per-member addressing (each commits on its own) ──────────────
    for link_id in doc.network_link_ids(network_id) {
        let Some(node_id) = doc.link(&link_id).and_then(|link| link.node.clone()) else {
            continue;
        };
        let Some(interface) = doc.node_interface_for_link(&node_id, &link_id) else {
            continue;
        };

        let address = if addr::is_ipv6(&opts.address) {
            let Some(iid) = ops::interface_iid(ctx, &mut doc, &node_id, &interface)? else {
                continue;
            };
            addr::ipv6_address_on_prefix(&prefix, &iid)
        } else {
            let host = doc.next_ipv4_host_id(network_id, &prefix);
            addr::ipv4_address_on_prefix(&prefix, mask, host)
        };

        ops::node_address(
            ctx,
            &ops::NodeAddressOptions {
                node_id,
                interface,
                address: format!("{address}/{mask}"),
                delete: opts.delete,
            },
        )?;
        doc = store.load()?;
    }

    // ── record the prefix ────────────────────────────────────────────
    {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let mut doc = store.load()?;
        if opts.delete {
            doc.remove_network_prefix(network_id, &prefix);
        } else {
            doc.set_network_prefix(network_id, &prefix, mask);
        }
        store.save(&doc)?;
    }

    Ok(OpOutput::empty())
}
