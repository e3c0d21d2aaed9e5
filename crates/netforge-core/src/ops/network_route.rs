//! Set a route on a network: applied to every current member node and
//! recorded so future members get it replayed at join time.

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::model::{NetworkType, NodeType, RouteRecord};
use crate::ops::{self, probe, validation};

pub struct NetworkRouteOptions {
    pub network_id: String,
    pub to: String,
    pub via: String,
    pub prefix: Option<String>,
    pub delete: bool,
}

pub fn network_route(ctx: &Context, opts: &NetworkRouteOptions) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let network_id = opts.network_id.as_str();

    // ── pre-check (under lock, released before the fan-out) ──────────
    let (to, via_node) = {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let mut doc = store.load()?;

        if network_id.is_empty() {
            return Err(validation("network_id", "missing name of the virtual network"));
        }
        if !probe::network_exists(ctx, &mut doc, network_id)? {
            return Err(CoreError::MissingResource {
                entity: "network",
                id: network_id.to_owned(),
            });
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

        // The gateway is excluded from the fan-out; find which node it is.
        let via_node = if addr::is_ip_address(&opts.via) {
            let via = addr::padding_zeros(&opts.via);
            let owner = doc
                .node_ids()
                .into_iter()
                .find(|node_id| doc.node_addresses(node_id).contains(&via));
            match owner {
                Some(owner) => Some(owner),
                None => {
                    return Err(validation(
                        "via",
                        format!("cannot find a node holding address {via}"),
                    ));
                }
            }
        } else if probe::node_exists(ctx, &mut doc, &opts.via)? {
            Some(opts.via.clone())
        } else {
            None
        };

        (to, via_node)
    };

    // ── apply to every member (each commits on its own) ──────────────
    let doc = store.load()?;
    for node_id in doc.network_node_ids(network_id) {
        if via_node.as_deref() == Some(node_id.as_str()) {
            continue;
        }
        ops::node_route(
            ctx,
            &ops::NodeRouteOptions {
                node_id,
                to: to.clone(),
                via: opts.via.clone(),
                prefix: opts.prefix.clone(),
                delete: opts.delete,
                record: true,
            },
        )?;
    }

    // ── gateway forwarding / NAT ─────────────────────────────────────
    if let Some(ref gateway) = via_node {
        let mut doc = store.load()?;
        for key in ["net.ipv4.ip_forward", "net.ipv6.conf.all.forwarding"] {
            let cmd = ctx.as_root(&format!("sysctl -n -w {key}=1"));
            ctx.run_at_node(&mut doc, gateway, &cmd)?;
        }

        // An access-point gateway masquerades its WAN side.
        let is_ap = doc
            .node(gateway)
            .is_some_and(|node| node.node_type == NodeType::Ap);
        if is_ap {
            let interfaces: Vec<(String, NetworkType)> = doc
                .node(gateway)
                .map(|node| {
                    node.interface
                        .iter()
                        .map(|(name, iface)| (name.clone(), iface.link_type))
                        .collect()
                })
                .unwrap_or_default();
            for (wan_iface, _) in interfaces
                .iter()
                .filter(|(_, link_type)| *link_type == NetworkType::Wan)
            {
                nat_on_interface(ctx, &mut doc, gateway, wan_iface, &interfaces)?;
            }
        }
    }

    // ── record on the network ────────────────────────────────────────
    {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let mut doc = store.load()?;
        if opts.delete {
            doc.remove_network_route(network_id, &to);
        } else {
            doc.set_network_route(
                network_id,
                &to,
                RouteRecord {
                    via: Some(opts.via.clone()),
                    prefix: opts.prefix.clone(),
                },
            );
        }
        store.save(&doc)?;
    }

    Ok(OpOutput::empty())
}

fn nat_on_interface(
    ctx: &Context,
    doc: &mut crate::model::StateDocument,
    node_id: &str,
    interface: &str,
    all_interfaces: &[(String, NetworkType)],
) -> Result<(), CoreError> {
    let cmd = ctx.as_root(&format!(
        "iptables -t nat -A POSTROUTING -o {interface} -j MASQUERADE"
    ));
    ctx.run_at_node(doc, node_id, &cmd)?;

    for (other, _) in all_interfaces.iter().filter(|(name, _)| name != interface) {
        let cmd = ctx.as_root(&format!(
            "iptables -A FORWARD -i {interface} -o {other} -m state --state RELATED,ESTABLISHED -j ACCEPT"
        ));
        ctx.run_at_node(doc, node_id, &cmd)?;

        let cmd = ctx.as_root(&format!(
            "iptables -A FORWARD -i {other} -o {interface} -j ACCEPT"
        ));
        ctx.run_at_node(doc, node_id, &cmd)?;
    }
    Ok(())
}
