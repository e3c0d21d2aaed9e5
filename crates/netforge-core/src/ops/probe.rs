// ── OS-visible existence probes ──
//
// Pre- and post-checks never trust the document alone; they ask the OS.
// All probing funnels through the executor and the thin listing parsers,
// so the same checks run against the real host or the simulated one.

use std::time::Duration;

use netforge_exec::parse;
use tracing::debug;

use crate::addr;
use crate::context::Context;
use crate::error::CoreError;
use crate::model::StateDocument;

pub fn host_interfaces(ctx: &Context) -> Result<Vec<String>, CoreError> {
    let out = ctx.run_host("ip link show")?;
    Ok(parse::interface_names(&out.stdout))
}

pub fn host_namespaces(ctx: &Context) -> Result<Vec<String>, CoreError> {
    let out = ctx.run_host("ip netns list")?;
    Ok(parse::namespace_names(&out.stdout))
}

pub fn namespace_exists(
    ctx: &Context,
    doc: &mut StateDocument,
    long_id: &str,
) -> Result<bool, CoreError> {
    let prefix = ctx.unique_prefix(doc, long_id);
    let exists = host_namespaces(ctx)?.contains(&prefix);
    debug!(
        "namespace {prefix} {}",
        if exists { "exists" } else { "does not exist" }
    );
    Ok(exists)
}

/// A node exists when its namespace does; local nodes only ever exist as
/// document records.
pub fn node_exists(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
) -> Result<bool, CoreError> {
    if doc.is_local_node(node_id) {
        return Ok(doc.node.contains_key(node_id));
    }
    namespace_exists(ctx, doc, node_id)
}

/// Bridges visible inside a network's namespace.
pub fn network_bridges(
    ctx: &Context,
    doc: &mut StateDocument,
    network_id: &str,
) -> Result<Vec<String>, CoreError> {
    let cmd = ctx.as_root("brctl show");
    let out = ctx.run_at_network(doc, network_id, &cmd)?;
    Ok(parse::bridge_names(&out.stdout))
}

/// A network exists when its namespace exists and holds its bridge.
pub fn network_exists(
    ctx: &Context,
    doc: &mut StateDocument,
    network_id: &str,
) -> Result<bool, CoreError> {
    if !namespace_exists(ctx, doc, network_id)? {
        return Ok(false);
    }
    let prefix = ctx.unique_prefix(doc, network_id);
    Ok(network_bridges(ctx, doc, network_id)?.contains(&prefix))
}

pub fn active_node_links(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
) -> Result<Vec<String>, CoreError> {
    let out = ctx.run_at_node(doc, node_id, "ip link show")?;
    Ok(parse::interface_names(&out.stdout))
}

pub fn active_network_links(
    ctx: &Context,
    doc: &mut StateDocument,
    network_id: &str,
) -> Result<Vec<String>, CoreError> {
    let out = ctx.run_at_network(doc, network_id, "ip link show")?;
    Ok(parse::interface_names(&out.stdout))
}

pub fn node_interface_exists(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
    interface_id: &str,
) -> Result<bool, CoreError> {
    Ok(active_node_links(ctx, doc, node_id)?.contains(&interface_id.to_owned()))
}

/// Whether any end of `link_id` is visible on the host or inside a
/// network namespace.
pub fn link_exists(
    ctx: &Context,
    doc: &mut StateDocument,
    link_id: &str,
) -> Result<bool, CoreError> {
    let bare = ctx.unique_prefix(doc, link_id);
    let net_end = ctx.unique_prefix(doc, &format!("{link_id}net"));
    let node_end = ctx.unique_prefix(doc, &format!("{link_id}node"));

    let host_links = host_interfaces(ctx)?;
    if host_links.contains(&bare) || host_links.contains(&net_end) || host_links.contains(&node_end)
    {
        return Ok(true);
    }

    for network_id in doc.network_ids() {
        if active_network_links(ctx, doc, &network_id)?.contains(&net_end) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Administrative state of a network's bridge as the OS reports it.
pub fn network_os_state(
    ctx: &Context,
    doc: &mut StateDocument,
    network_id: &str,
) -> Result<String, CoreError> {
    let prefix = ctx.unique_prefix(doc, network_id);
    let out = ctx.run_at_network(doc, network_id, &format!("ip link show {prefix}"))?;

    let first = out.stdout.lines().next().unwrap_or_default();
    let fields: Vec<&str> = first.split_whitespace().collect();
    Ok(fields.get(8).map_or("UNKNOWN", |s| *s).to_owned())
}

/// Addresses on one node interface, zero-padded for comparison.
pub fn node_interface_addresses(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
    interface_id: &str,
) -> Result<Vec<String>, CoreError> {
    let out = ctx.run_at_node(doc, node_id, &format!("ip addr show {interface_id}"))?;
    Ok(parse::addresses(&out.stdout)
        .into_iter()
        .map(|a| addr::padding_zeros(&a))
        .collect())
}

/// Hardware address of one node interface.
pub fn node_hw_address(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
    interface_id: &str,
) -> Result<Option<String>, CoreError> {
    let out = ctx.run_at_node(doc, node_id, &format!("ip addr show {interface_id}"))?;
    Ok(parse::hw_address(&out.stdout))
}

/// Whether the node already has an IPv4 default route.
pub fn ipv4_default_exists(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
) -> Result<bool, CoreError> {
    let cmd = ctx.as_root("ip route");
    let out = ctx.run_at_node(doc, node_id, &cmd)?;
    Ok(out.stdout.lines().any(|line| line.contains("default")))
}

/// Route listing (one family) inside a node.
pub fn node_routes(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
    v6: bool,
) -> Result<String, CoreError> {
    let cmd = if v6 { "ip -6 route" } else { "ip route" };
    let cmd = ctx.as_root(cmd);
    Ok(ctx.run_at_node(doc, node_id, &cmd)?.stdout)
}

/// Poll until no address is left in duplicate-address detection. DAD is
/// disabled on managed interfaces, but under load an address can stay
/// tentative for a few milliseconds anyway.
pub fn wait_for_dad(
    ctx: &Context,
    doc: &mut StateDocument,
    node_id: &str,
) -> Result<(), CoreError> {
    let mut interval = Duration::from_millis(10);
    let max_wait = Duration::from_secs(60);
    let mut slept = Duration::ZERO;

    loop {
        let out = ctx.run_at_node(doc, node_id, "ip addr show tentative")?;
        if !parse::has_tentative(&out.stdout) {
            return Ok(());
        }
        if slept > max_wait {
            return Err(CoreError::Consistency {
                message: format!("addresses on node '{node_id}' stuck in tentative state"),
            });
        }
        std::thread::sleep(interval);
        slept += interval;
        interval *= 2;
    }
}
