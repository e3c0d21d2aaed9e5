//! Add or remove a route inside a node.
//!
//! Route edits run under the `rt` lock: routing-table changes are not
//! safely concurrent across processes sharing a kernel, even when they
//! target different namespaces. The state record update then commits
//! under the `state` lock like any other document edit.

use tracing::warn;

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::model::{RouteRecord, StateDocument};
use crate::ops::{probe, validation};

pub struct NodeRouteOptions {
    pub node_id: String,
    /// Destination: an address or `default`.
    pub to: String,
    /// Gateway: an address, a node id, or an interface name.
    pub via: String,
    /// Disambiguating prefix when the gateway node has several addresses.
    pub prefix: Option<String>,
    pub delete: bool,
    /// Whether to record the route in the node's state entry.
    pub record: bool,
}

/// Resolved gateway: either an address or a local device.
enum Gateway {
    Address(String),
    Device(String),
}

pub fn node_route(ctx: &Context, opts: &NodeRouteOptions) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let mut doc = store.load()?;
    let node_id = opts.node_id.as_str();

    let (to, gateway) = pre_check(ctx, &mut doc, opts)?;

    // Tap nodes route inside their own stack; the kernel tables are not
    // touched for them.
    if !doc.is_tap_node(node_id) {
        {
            let _rt = ctx.locks().acquire(LockDomain::Rt)?;
            apply_route(ctx, &mut doc, opts, &to, &gateway)?;
        }
        post_check(ctx, &mut doc, opts, &to, &gateway)?;
    }

    {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let mut doc = store.load()?;
        if opts.record {
            if opts.delete {
                doc.remove_node_route(node_id, &to);
            } else {
                doc.set_node_route(
                    node_id,
                    &to,
                    RouteRecord {
                        via: Some(opts.via.clone()),
                        prefix: opts.prefix.clone(),
                    },
                );
            }
        }
        store.save(&doc)?;
    }

    Ok(OpOutput::empty())
}

fn pre_check(
    ctx: &Context,
    doc: &mut StateDocument,
    opts: &NodeRouteOptions,
) -> Result<(String, Gateway), CoreError> {
    let node_id = opts.node_id.as_str();

    if node_id.is_empty() {
        return Err(validation("node_id", "missing name of the virtual node"));
    }
    if !probe::node_exists(ctx, doc, node_id)? {
        warn!("[{node_id}] virtual node does not exist");
    }
    if opts.to.is_empty() {
        return Err(validation("to", "missing destination address"));
    }
    if opts.via.is_empty() {
        return Err(validation("via", "missing gateway (via)"));
    }
    if addr::is_ip_address(&opts.to)
        && addr::is_ip_address(&opts.via)
        && addr::is_ipv6(&opts.to) != addr::is_ipv6(&opts.via)
    {
        return Err(validation(
            "via",
            format!("mixing address families: {} and {}", opts.to, opts.via),
        ));
    }

    if opts.to != "default" && !addr::is_ip_address(&opts.to) {
        return Err(validation(
            "to",
            "destination must be 'default' or an IP address",
        ));
    }
    let to = if addr::is_ip_address(&opts.to) {
        addr::padding_zeros(&opts.to)
    } else {
        opts.to.clone()
    };

    // Gateway resolution: an address as-is, a local interface as a device
    // route, or another node whose shared-network address becomes the via.
    if addr::is_ip_address(&opts.via) {
        return Ok((to, Gateway::Address(addr::padding_zeros(&opts.via))));
    }
    if probe::node_interface_exists(ctx, doc, node_id, &opts.via)? {
        return Ok((to, Gateway::Device(opts.via.clone())));
    }
    if !probe::node_exists(ctx, doc, &opts.via)? {
        return Err(validation(
            "via",
            format!("'{}' is neither an address, an interface, nor a known node", opts.via),
        ));
    }

    let this_networks = doc.node_network_ids(node_id);
    let gateway_networks = doc.node_network_ids(&opts.via);
    let common: Vec<&String> = this_networks
        .iter()
        .filter(|id| gateway_networks.contains(id))
        .collect();

    if common.is_empty() {
        return Err(validation(
            "via",
            format!("node '{node_id}' and gateway '{}' share no network", opts.via),
        ));
    }
    if common.len() > 1 && opts.prefix.is_none() {
        return Err(validation(
            "prefix",
            format!(
                "node '{node_id}' and gateway '{}' share several networks; a prefix is needed",
                opts.via
            ),
        ));
    }

    let addresses = match &opts.prefix {
        None => doc.node_addresses_on_network(&opts.via, common[0]),
        Some(prefix) => {
            if !addr::is_ip_address(prefix) {
                return Err(validation("prefix", format!("'{prefix}' is not an IP prefix")));
            }
            let (prefix_addr, prefix_mask) = addr::split_address_mask(prefix);
            let prefix = addr::get_prefix(&prefix_addr, prefix_mask);
            doc.node_addresses_on_network_on_prefix(&opts.via, common[0], &prefix)
        }
    };

    match addresses.as_slice() {
        [] => Err(validation(
            "via",
            format!("gateway node '{}' has no usable IP address", opts.via),
        )),
        [only] => Ok((to, Gateway::Address(only.clone()))),
        _ if opts.prefix.is_none() => Err(validation(
            "prefix",
            format!(
                "gateway node '{}' has several addresses; a prefix is needed",
                opts.via
            ),
        )),
        _ => Err(validation(
            "prefix",
            format!(
                "several gateway addresses match the prefix: {}",
                addresses.join(", ")
            ),
        )),
    }
}

fn apply_route(
    ctx: &Context,
    doc: &mut StateDocument,
    opts: &NodeRouteOptions,
    to: &str,
    gateway: &Gateway,
) -> Result<(), CoreError> {
    let families: &[u8] = match gateway {
        // A device route for `default` covers both families.
        Gateway::Device(_) if to == "default" => &[4, 6],
        Gateway::Address(via) if addr::is_ipv6(via) => &[6],
        _ if addr::is_ipv6(to) => &[6],
        _ => &[4],
    };

    for family in families {
        let action = if opts.delete { "delete" } else { "add" };
        let mut cmd = format!("ip -{family} route {action} {to}");
        match gateway {
            Gateway::Address(via) => cmd.push_str(&format!(" via {via}")),
            Gateway::Device(dev) => cmd.push_str(&format!(" dev {dev}")),
        }
        let cmd = ctx.as_root(&cmd);
        ctx.run_at_node(doc, &opts.node_id, &cmd)?;
    }
    Ok(())
}

fn post_check(
    ctx: &Context,
    doc: &mut StateDocument,
    opts: &NodeRouteOptions,
    to: &str,
    gateway: &Gateway,
) -> Result<(), CoreError> {
    let exists = route_exists(ctx, doc, &opts.node_id, to, gateway)?;
    if opts.delete && exists {
        return Err(CoreError::Consistency {
            message: format!(
                "failed to remove route to {to} via {} at node '{}'",
                opts.via, opts.node_id
            ),
        });
    }
    if !opts.delete && !exists {
        return Err(CoreError::Consistency {
            message: format!(
                "failed to add route to {to} via {} at node '{}'",
                opts.via, opts.node_id
            ),
        });
    }
    Ok(())
}

fn route_exists(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
    to: &str,
    gateway: &Gateway,
) -> Result<bool, CoreError> {
    for v6 in [false, true] {
        let listing = probe::node_routes(ctx, doc, node_id, v6)?;
        for line in listing.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                continue;
            }
            let dest_matches = if to == "default" {
                fields[0] == "default"
            } else {
                addr::padding_zeros(fields[0]) == to
            };
            if !dest_matches {
                continue;
            }
            let via_matches = match gateway {
                Gateway::Address(via) => {
                    fields[1] == "via" && addr::padding_zeros(fields[2]) == *via
                }
                Gateway::Device(dev) => fields[1] == "dev" && fields[2] == dev,
            };
            if via_matches {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
