//! Connect a node to the real Internet through a simulated ISP.
//!
//! The first connection builds the shared uplink: a bridge in its own
//! namespace, a veth pair from the host into it, NAT on the host's real
//! interface, and the 255-slot address pool. Every connecting node then
//! takes a pool slot and a veth pair of its own. The last disconnect
//! (occupancy back to the reserved slot alone) tears the uplink down and
//! reverses the recorded firewall rules.
//!
//! Lock choreography follows the domains: pool accounting under `isp`,
//! route edits under `rt`, the topology record under `state`.

use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::model::InternetRecord;
use crate::ops::{probe, validation};
use crate::pool;

use netforge_exec::parse;

pub struct InternetOptions {
    /// Required on connect; resolved from the record on disconnect.
    pub node_id: Option<String>,
    /// ISP name; scopes the pool, the bridge, and every interface name.
    pub isp_id: String,
    /// Host IP prefix seed: addresses come from 172.16.<seed>.0/24.
    pub seed: u8,
    /// Host interface with real connectivity; default-route interface
    /// when absent.
    pub iface: Option<String>,
}

struct UplinkNames {
    bridge: String,
    host_addr: String,
    prefix: String,
    /// Host-side end of the uplink veth (stays on the host).
    internet_node_end: String,
    /// Bridge-side end of the uplink veth.
    internet_host_end: String,
}

impl InternetOptions {
    fn uplink(&self) -> UplinkNames {
        let prefix = format!("172.16.{}.", self.seed);
        UplinkNames {
            bridge: format!("{}Bridge", self.isp_id),
            host_addr: format!("{prefix}1"),
            prefix,
            internet_node_end: format!("{}1_node", self.isp_id),
            internet_host_end: format!("{}1_host", self.isp_id),
        }
    }
}

const MASK: &str = "24";

pub fn internet_connect(ctx: &Context, opts: &InternetOptions) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let mut doc = store.load()?;
    let names = opts.uplink();

    // ── pre-check ────────────────────────────────────────────────────
    if !(1..=252).contains(&opts.seed) {
        return Err(validation("seed", format!("seed {} is not in [1, 252]", opts.seed)));
    }
    let node_id = opts
        .node_id
        .clone()
        .ok_or_else(|| validation("node_id", "missing name of the node to connect"))?;
    if !probe::node_exists(ctx, &mut doc, &node_id)? {
        return Err(CoreError::MissingResource {
            entity: "node",
            id: node_id.clone(),
        });
    }
    if doc.global.internet.contains_key(&opts.isp_id) {
        return Err(CoreError::AlreadyExists {
            entity: "internet connection",
            id: opts.isp_id.clone(),
        });
    }
    if doc.is_local_node(&node_id) {
        return Err(validation(
            "node_id",
            "the host node is already connected to the Internet",
        ));
    }

    // ── take a slot (uplink built on first use), under `isp` ─────────
    let slot = {
        let _isp = ctx.locks().acquire(LockDomain::Isp)?;
        let isp_store = ctx.isp_store(&opts.isp_id);
        let mut isp_doc = isp_store.load()?;

        if isp_doc.global_isp.isp.is_empty() {
            isp_doc.global_isp.isp = pool::build_pool(&names.prefix, &opts.isp_id);
            build_uplink(ctx, opts, &names, &mut isp_doc.global_isp.firewall_rules)?;
            pool::set_occupancy(&mut isp_doc.global_isp.isp, 0, true);
        }

        let index = pool::first_available(&isp_doc.global_isp.isp).ok_or_else(|| {
            CoreError::Consistency {
                message: format!("ISP pool '{}' is exhausted", opts.isp_id),
            }
        })?;
        pool::set_occupancy(&mut isp_doc.global_isp.isp, index, true);
        let slot = isp_doc.global_isp.isp[index].clone();
        isp_store.save(&isp_doc)?;
        slot
    };

    // ── node's veth into the uplink bridge ───────────────────────────
    let cmd = ctx.as_root(&format!(
        "ip link add name {} type veth peer name {}",
        slot.isp_node_end, slot.isp_host_end
    ));
    ctx.run_host(&cmd)?;

    let node_prefix = ctx.unique_prefix(&mut doc, &node_id);
    for cmd in [
        format!("ip link set {} netns {}", slot.isp_host_end, names.bridge),
        format!("ip link set {} netns {node_prefix}", slot.isp_node_end),
        format!(
            "ip netns exec {} brctl addif {} {}",
            names.bridge, names.bridge, slot.isp_host_end
        ),
    ] {
        let cmd = ctx.as_root(&cmd);
        ctx.run_host(&cmd)?;
    }

    let cmd = ctx.as_root(&format!(
        "ip address add {}/{MASK} dev {}",
        slot.isp_addr, slot.isp_node_end
    ));
    ctx.run_at_node(&mut doc, &node_id, &cmd)?;

    let cmd = ctx.as_root(&format!("ifconfig {} up", slot.isp_node_end));
    ctx.run_at_node(&mut doc, &node_id, &cmd)?;
    let cmd = ctx.as_root(&format!(
        "ip netns exec {} ifconfig {} up",
        names.bridge, slot.isp_host_end
    ));
    ctx.run_host(&cmd)?;

    // ── default route via the uplink, under `rt` ─────────────────────
    {
        let _rt = ctx.locks().acquire(LockDomain::Rt)?;
        if probe::ipv4_default_exists(ctx, &mut doc, &node_id)? {
            warn!("[{node_id}] already has a default route; leaving it in place");
        } else {
            let cmd = ctx.as_root(&format!("ip route add default via {}", names.host_addr));
            ctx.run_at_node(&mut doc, &node_id, &cmd)?;
        }
    }

    // NAT on the node so namespaces behind it can reach out too.
    for rule in [
        format!("-t nat -A POSTROUTING -o {} -j MASQUERADE", slot.isp_node_end),
        format!(
            "-A FORWARD -o {} -m state --state RELATED,ESTABLISHED -j ACCEPT",
            slot.isp_node_end
        ),
        format!("-A FORWARD -i {} -j ACCEPT", slot.isp_node_end),
    ] {
        let cmd = ctx.as_root(&format!("iptables {rule}"));
        ctx.run_at_node(&mut doc, &node_id, &cmd)?;
    }

    // ── record the connection, under `state` ─────────────────────────
    {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let mut doc = store.load()?;
        doc.global.internet.insert(
            opts.isp_id.clone(),
            InternetRecord {
                node_id: node_id.clone(),
                node_link: slot.isp_node_end.clone(),
                host_link: slot.isp_host_end.clone(),
                isp_addr: slot.isp_addr.clone(),
                isp_index: slot.isp_index,
                isp: opts.isp_id.clone(),
                iface: opts.iface.clone(),
            },
        );
        store.save(&doc)?;
    }

    Ok(OpOutput::with_data(slot.isp_addr))
}

pub fn internet_disconnect(ctx: &Context, opts: &InternetOptions) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let names = opts.uplink();

    // ── resolve the connection record ────────────────────────────────
    let record = {
        let doc = store.load()?;
        doc.global
            .internet
            .get(&opts.isp_id)
            .cloned()
            .ok_or_else(|| CoreError::MissingResource {
                entity: "internet connection",
                id: opts.isp_id.clone(),
            })?
    };
    let node_id = record.node_id.clone();

    // ── remove the route and the record, under `rt` then `state` ─────
    {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let mut doc = store.load()?;
        {
            let _rt = ctx.locks().acquire(LockDomain::Rt)?;
            let cmd = ctx.as_root("ip route delete default");
            let _ = ctx.run_at_node(&mut doc, &node_id, &cmd);
        }
        doc.global.internet.remove(&opts.isp_id);
        store.save(&doc)?;
    }

    // ── bring the node's uplink down and delete it ───────────────────
    {
        let mut doc = store.load()?;
        let cmd = ctx.as_root(&format!("ifconfig {} down", record.node_link));
        let _ = ctx.run_at_node(&mut doc, &node_id, &cmd);
        let cmd = ctx.as_root(&format!(
            "ip netns exec {} ifconfig {} down",
            names.bridge, record.host_link
        ));
        let _ = ctx.run_host(&cmd);
        let cmd = ctx.as_root(&format!("ip link delete {}", record.node_link));
        let _ = ctx.run_at_node(&mut doc, &node_id, &cmd);
    }

    // ── release the slot; last consumer tears the uplink down ────────
    {
        let _isp = ctx.locks().acquire(LockDomain::Isp)?;
        let isp_store = ctx.isp_store(&opts.isp_id);
        let mut isp_doc = isp_store.load()?;

        let index = usize::try_from(record.isp_index.saturating_sub(1)).unwrap_or(0);
        pool::set_occupancy(&mut isp_doc.global_isp.isp, index, false);

        if pool::teardown_eligible(&isp_doc.global_isp.isp) {
            debug!("last consumer left ISP '{}'; tearing down the uplink", opts.isp_id);
            teardown_uplink(ctx, &names, &isp_doc.global_isp.firewall_rules);
            isp_doc.global_isp.isp.clear();
            isp_doc.global_isp.firewall_rules.clear();
        }
        isp_store.save(&isp_doc)?;
    }

    Ok(OpOutput::empty())
}

/// Build the shared uplink: bridge namespace, host veth, host address,
/// forwarding, and NAT. Applied firewall rules are recorded for reversal.
fn build_uplink(
    ctx: &Context,
    opts: &InternetOptions,
    names: &UplinkNames,
    applied_rules: &mut Vec<String>,
) -> Result<(), CoreError> {
    let cmd = ctx.as_root(&format!(
        "ip link add name {} type veth peer name {}",
        names.internet_node_end, names.internet_host_end
    ));
    ctx.run_host(&cmd)?;

    for cmd in [
        format!("ip netns add {}", names.bridge),
        format!("ip netns exec {} brctl addbr {}", names.bridge, names.bridge),
        format!("ip netns exec {} brctl setageing {} 0", names.bridge, names.bridge),
        format!("ip netns exec {} ifconfig {} up", names.bridge, names.bridge),
        format!("ip link set {} netns {}", names.internet_host_end, names.bridge),
        format!(
            "ip netns exec {} brctl addif {} {}",
            names.bridge, names.bridge, names.internet_host_end
        ),
        format!(
            "ip netns exec {} ifconfig {} up",
            names.bridge, names.internet_host_end
        ),
        format!("ifconfig {} up", names.internet_node_end),
    ] {
        let cmd = ctx.as_root(&cmd);
        ctx.run_host(&cmd)?;
    }

    // Keep NetworkManager's hands off the new host interface.
    let cmd = ctx.as_root(&format!(
        "nmcli dev disconnect iface {}",
        names.internet_node_end
    ));
    let _ = ctx.run_host(&cmd);

    let cmd = ctx.as_root(&format!(
        "ip address add {}/{MASK} dev {}",
        names.host_addr, names.internet_node_end
    ));
    ctx.run_host(&cmd)?;

    // NAT out through the host's real uplink interface.
    let iface = resolve_uplink_interface(ctx, opts)?;
    for key in ["net.ipv6.conf.all.forwarding", "net.ipv4.ip_forward"] {
        let cmd = ctx.as_root(&format!("sysctl -n -w {key}=1"));
        ctx.run_host(&cmd)?;
    }
    for rule in [
        format!("-t nat -A POSTROUTING -o {iface} -j MASQUERADE"),
        format!(
            "-A FORWARD -i {iface} -o {} -m state --state RELATED,ESTABLISHED -j ACCEPT",
            names.internet_node_end
        ),
        format!("-A FORWARD -i {} -o {iface} -j ACCEPT", names.internet_node_end),
    ] {
        let cmd = ctx.as_root(&format!("iptables {rule}"));
        let out = ctx.run_host(&cmd)?;
        if out.success() {
            applied_rules.push(rule);
        }
    }
    Ok(())
}

/// Reverse of `build_uplink`; failures are warned, not fatal, so teardown
/// always runs to completion.
fn teardown_uplink(ctx: &Context, names: &UplinkNames, applied_rules: &[String]) {
    for cmd in [
        format!(
            "ip netns exec {} ifconfig {} down",
            names.bridge, names.internet_host_end
        ),
        format!("ifconfig {} down", names.internet_node_end),
        format!("ip link delete {}", names.internet_node_end),
    ] {
        let cmd = ctx.as_root(&cmd);
        if let Err(err) = ctx.run_host(&cmd) {
            warn!("uplink teardown step failed: {err}");
        }
    }

    for rule in applied_rules {
        let reversed = rule.replacen("-A ", "-D ", 1);
        let cmd = ctx.as_root(&format!("iptables {reversed}"));
        if let Err(err) = ctx.run_host(&cmd) {
            warn!("failed to reverse firewall rule '{rule}': {err}");
        }
    }

    let cmd = ctx.as_root(&format!("ip netns del {}", names.bridge));
    if let Err(err) = ctx.run_host(&cmd) {
        warn!("failed to delete uplink namespace: {err}");
    }
}

fn resolve_uplink_interface(ctx: &Context, opts: &InternetOptions) -> Result<String, CoreError> {
    if let Some(ref iface) = opts.iface {
        return Ok(iface.clone());
    }
    if let Some(ref iface) = ctx.config().uplink_interface {
        return Ok(iface.clone());
    }
    let out = ctx.run_host("ip route")?;
    parse::default_route_interface(&out.stdout).ok_or_else(|| {
        validation(
            "iface",
            "cannot determine the host interface connected to the Internet",
        )
    })
}
