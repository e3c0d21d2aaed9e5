//! Attach a node to a network.
//!
//! Composite orchestrator: creates a link, wires both ends into their
//! namespaces, renames and raises the node side, then replays the
//! network's prefixes and routes onto the new member. The nested link
//! creation commits under its own lock scope, so the document is re-read
//! after it returns.

use std::collections::BTreeMap;

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::model::{Interface, MemberRecord, RouteRecord};
use crate::ops::{self, probe, validation};

pub struct NodeJoinOptions {
    pub node_id: String,
    pub network_id: String,
    pub tap: bool,
    pub fix_hw_addr: Option<String>,
    pub customized_eui64: Option<String>,
}

impl NodeJoinOptions {
    pub fn new(node_id: impl Into<String>, network_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            network_id: network_id.into(),
            tap: false,
            fix_hw_addr: None,
            customized_eui64: None,
        }
    }
}

pub fn node_join(ctx: &Context, opts: &NodeJoinOptions) -> Result<OpOutput, CoreError> {
    let node_id = opts.node_id.as_str();
    let network_id = opts.network_id.as_str();

    // A fixed EUI-64 implies the hardware address of its lower six octets.
    let mut fix_hw_addr = opts.fix_hw_addr.clone();
    let customized_eui64 = opts.customized_eui64.as_ref().map(|eui| {
        if fix_hw_addr.is_none() && eui.len() > 6 {
            fix_hw_addr = Some(eui[6..].to_owned());
        }
        eui.replace(':', "-")
    });

    let node_interface_name;
    {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let store = ctx.store();
        let mut doc = store.load()?;

        // ── pre-check ────────────────────────────────────────────────
        if node_id.is_empty() {
            return Err(validation("node_id", "missing name of the joining virtual node"));
        }
        if network_id.is_empty() {
            return Err(validation("network_id", "missing name of the network to join"));
        }
        if !probe::node_exists(ctx, &mut doc, node_id)? {
            return Err(CoreError::MissingResource {
                entity: "node",
                id: node_id.to_owned(),
            });
        }
        if !probe::network_exists(ctx, &mut doc, network_id)? {
            return Err(CoreError::MissingResource {
                entity: "network",
                id: network_id.to_owned(),
            });
        }
        if doc.node_network_ids(node_id).contains(&network_id.to_owned()) {
            return Err(CoreError::AlreadyExists {
                entity: "membership",
                id: format!("{node_id} in {network_id}"),
            });
        }

        fix_hw_addr = fix_hw_addr.as_deref().map(addr::fix_hw_addr);
        if let Some(ref hw) = fix_hw_addr {
            if hw.matches(':').count() != 5 {
                return Err(validation("fix_hw_addr", format!("invalid MAC address '{hw}'")));
            }
        }

        let network_type = doc
            .network(network_id)
            .map(|network| network.network_type)
            .ok_or_else(|| CoreError::MissingResource {
                entity: "network",
                id: network_id.to_owned(),
            })?;

        // ── create the link (nested, commits on its own) ─────────────
        let link_result = ops::link_add(
            ctx,
            &ops::LinkAddOptions {
                link_type: network_type,
                tap: opts.tap,
            },
        )?;
        let link_id = link_result.data.ok_or_else(|| CoreError::Consistency {
            message: "link creation returned no link id".into(),
        })?;
        doc = store.load()?;

        if !doc.link.contains_key(&link_id) {
            return Err(CoreError::Consistency {
                message: format!("link '{link_id}' was not recorded"),
            });
        }

        let link = doc.link(&link_id).cloned().ok_or_else(|| CoreError::Consistency {
            message: format!("link '{link_id}' disappeared"),
        })?;

        // Interface name: type base plus a per-node ordinal; on the local
        // host, skip names real interfaces already use.
        let base = network_type.interface_base();
        let mut ordinal = doc
            .node(node_id)
            .map(|node| {
                node.interface
                    .values()
                    .filter(|iface| iface.link_type == network_type)
                    .count()
            })
            .unwrap_or(0);
        node_interface_name = {
            let mut name = format!("{base}{ordinal}");
            if doc.is_local_node(node_id) {
                let host_links = probe::host_interfaces(ctx)?;
                while host_links.contains(&name) {
                    ordinal += 1;
                    name = format!("{base}{ordinal}");
                }
            }
            name
        };

        // ── wire the network side ────────────────────────────────────
        let network_prefix = ctx.unique_prefix(&mut doc, network_id);
        let cmd = ctx.as_root(&format!(
            "ip link set {} netns {network_prefix}",
            link.network_end
        ));
        ctx.run_host(&cmd)?;

        let cmd = ctx.as_root(&format!(
            "brctl addif {network_prefix} {}",
            link.network_end
        ));
        ctx.run_at_network(&mut doc, network_id, &cmd)?;

        // ── wire the node side ───────────────────────────────────────
        let node_prefix = ctx.unique_prefix(&mut doc, node_id);
        if !doc.is_local_node(node_id) {
            if link.tap {
                move_tap_trio(ctx, &mut doc, &link_id, node_id, &node_prefix)?;
            } else {
                let cmd = ctx.as_root(&format!(
                    "ip link set {} netns {node_prefix}",
                    link.node_end
                ));
                ctx.run_host(&cmd)?;
            }
        }

        let mut rename = format!("ip link set {} name {node_interface_name}", link.node_end);
        if let Some(ref hw) = fix_hw_addr {
            rename.push_str(&format!(" address {hw}"));
        }
        let cmd = ctx.as_root(&rename);
        ctx.run_at_node(&mut doc, node_id, &cmd)?;

        // The local host's NetworkManager would otherwise grab the new
        // interface; failure is tolerated where nmcli is absent.
        if doc.is_local_node(node_id) && !opts.tap {
            let cmd = ctx.as_root(&format!("nmcli dev disconnect iface {node_interface_name}"));
            let _ = ctx.run_host(&cmd);
        }

        // ── bring everything up ──────────────────────────────────────
        bring_link_up(
            ctx,
            &mut doc,
            &link_id,
            &node_interface_name,
            node_id,
            network_id,
        )?;

        // ── state record ─────────────────────────────────────────────
        if let Some(record) = doc.link.get_mut(&link_id) {
            record.node = Some(node_id.to_owned());
            record.network = Some(network_id.to_owned());
            record.fix_hw_addr = fix_hw_addr.clone();
        }
        if let Some(network) = doc.network_mut(network_id) {
            network
                .interface
                .insert(link_id.clone(), MemberRecord::default());
        }
        doc.set_node_interface(
            node_id,
            &node_interface_name,
            Interface {
                link: Some(link_id.clone()),
                link_type: network_type,
                ip: BTreeMap::new(),
                customized_eui64,
            },
        );
        store.save(&doc)?;
    }

    // ── addressing and routes, outside the join's own lock scope ─────
    assign_network_addresses(ctx, node_id, network_id, &node_interface_name)?;
    replay_network_routes(ctx, node_id, network_id)?;

    Ok(OpOutput::empty())
}

/// Move a tap link's trio into the node: tap and veth move, the bridge is
/// recreated inside (bridges cannot change namespace).
fn move_tap_trio(
    ctx: &Context,
    doc: &mut crate::model::StateDocument,
    link_id: &str,
    node_id: &str,
    node_prefix: &str,
) -> Result<(), CoreError> {
    let link = doc
        .link(link_id)
        .cloned()
        .ok_or_else(|| CoreError::Consistency {
            message: format!("link '{link_id}' disappeared"),
        })?;
    let tap_link = ctx.unique_prefix(doc, &format!("{link_id}tap"));
    let tap_bridge = ctx.unique_prefix(doc, &format!("{link_id}bridge"));

    for name in [&link.node_end, &tap_link] {
        let cmd = ctx.as_root(&format!("ip link set {name} netns {node_prefix}"));
        ctx.run_host(&cmd)?;
    }

    let cmd = ctx.as_root(&format!("ip link delete {tap_bridge}"));
    ctx.run_host(&cmd)?;
    let cmd = ctx.as_root(&format!("ip link add {tap_bridge} type bridge"));
    ctx.run_at_node(doc, node_id, &cmd)?;

    for name in [&link.node_end, &tap_link] {
        let cmd = ctx.as_root(&format!("ip link set {name} master {tap_bridge}"));
        ctx.run_at_node(doc, node_id, &cmd)?;
    }
    Ok(())
}

fn bring_link_up(
    ctx: &Context,
    doc: &mut crate::model::StateDocument,
    link_id: &str,
    node_interface_name: &str,
    node_id: &str,
    network_id: &str,
) -> Result<(), CoreError> {
    let link = doc
        .link(link_id)
        .cloned()
        .ok_or_else(|| CoreError::Consistency {
            message: format!("link '{link_id}' disappeared"),
        })?;

    if link.tap {
        let tap_link = ctx.unique_prefix(doc, &format!("{link_id}tap"));
        let tap_bridge = ctx.unique_prefix(doc, &format!("{link_id}bridge"));
        for name in [tap_link, tap_bridge] {
            let cmd = ctx.as_root(&format!("ifconfig {name} up"));
            ctx.run_at_node(doc, node_id, &cmd)?;
        }
    }

    // DAD off before the interface comes up; joins would otherwise race
    // duplicate-address detection on every bring-up.
    let cmd = ctx.as_root(&format!(
        "sysctl net.ipv6.conf.{node_interface_name}.accept_dad=0"
    ));
    ctx.run_at_node(doc, node_id, &cmd)?;

    let cmd = ctx.as_root(&format!("ifconfig {node_interface_name} up"));
    ctx.run_at_node(doc, node_id, &cmd)?;

    let cmd = ctx.as_root(&format!("ifconfig {} up", link.network_end));
    ctx.run_at_network(doc, network_id, &cmd)?;

    probe::wait_for_dad(ctx, doc, node_id)
}

/// Give the new member an address on every prefix the network carries.
fn assign_network_addresses(
    ctx: &Context,
    node_id: &str,
    network_id: &str,
    interface: &str,
) -> Result<(), CoreError> {
    let store = ctx.store();
    let mut doc = store.load()?;

    let prefixes: Vec<(String, u8)> = doc
        .network(network_id)
        .map(|network| {
            network
                .prefix
                .iter()
                .map(|(prefix, record)| (prefix.clone(), record.mask))
                .collect()
        })
        .unwrap_or_default();

    for (prefix, mask) in prefixes {
        let address = if addr::is_ipv6(&prefix) {
            let Some(iid) = ops::interface_iid(ctx, &mut doc, node_id, interface)? else {
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
                node_id: node_id.to_owned(),
                interface: interface.to_owned(),
                address: format!("{address}/{mask}"),
                delete: false,
            },
        )?;
        doc = store.load()?;
    }
    Ok(())
}

/// Replay the network's recorded routes onto the new member.
fn replay_network_routes(ctx: &Context, node_id: &str, network_id: &str) -> Result<(), CoreError> {
    let doc = ctx.store().load()?;
    let routes: Vec<(String, RouteRecord)> = doc
        .network(network_id)
        .map(|network| {
            network
                .route
                .iter()
                .map(|(to, record)| (to.clone(), record.clone()))
                .collect()
        })
        .unwrap_or_default();

    for (to, record) in routes {
        let to = to
            .trim_end_matches("_v4")
            .trim_end_matches("_v6")
            .to_owned();
        ops::node_route(
            ctx,
            &ops::NodeRouteOptions {
                node_id: node_id.to_owned(),
                to,
                via: record.via.clone().unwrap_or_default(),
                prefix: record.prefix.clone(),
                delete: false,
                record: true,
            },
        )?;
    }
    Ok(())
}
