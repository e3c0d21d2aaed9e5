//! Create a virtual link: a veth pair, or a tap + bridge + veth trio for
//! L2 configurations.

use tracing::warn;

use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::ident;
use crate::lock::LockDomain;
use crate::model::{Link, NetworkType};
use crate::ops::{self, probe};

pub struct LinkAddOptions {
    pub link_type: NetworkType,
    pub tap: bool,
}

pub fn link_add(ctx: &Context, opts: &LinkAddOptions) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;

    // Numbering reuses gaps left by deleted links, so generated names stay
    // compact over a topology's life.
    let number = ident::next_link_number(&doc, opts.link_type);
    let link_id = format!("{}{}", opts.link_type, number);

    if probe::link_exists(ctx, &mut doc, &link_id)? {
        warn!("[{link_id}] virtual link already exists");
        ops::link_delete(ctx, &link_id)?;
        doc = store.load()?;
    }

    // End names are allocated after the absorb above: the delete clears a
    // leftover link's identifier mappings, and the record written below
    // must agree with the live map.
    let node_end = ctx.unique_prefix(&mut doc, &format!("{link_id}node"));
    let network_end = ctx.unique_prefix(&mut doc, &format!("{link_id}net"));
    let tap_link = ctx.unique_prefix(&mut doc, &format!("{link_id}tap"));
    let tap_bridge = ctx.unique_prefix(&mut doc, &format!("{link_id}bridge"));

    // ── state record before the interfaces ───────────────────────────
    doc.link.insert(
        link_id.clone(),
        Link {
            link_type: opts.link_type,
            number,
            node: None,
            network: None,
            node_end: node_end.clone(),
            network_end: network_end.clone(),
            tap: opts.tap,
            fix_hw_addr: None,
        },
    );
    store.save(&doc)?;

    // ── OS creation ──────────────────────────────────────────────────
    if opts.tap {
        // The tap sits in a bridge on the node side; a veth pair connects
        // that bridge to the network:
        //
        //   <tap>o                    ── <net-end>
        //        |                   /
        //   <bridge> ── <tap-link> ──
        let mut tuntap = format!("ip tuntap add {node_end} mode tap");
        if let Ok(user) = std::env::var("USER") {
            tuntap.push_str(&format!(" user {user}"));
        }
        for cmd in [
            tuntap,
            format!("ip link add {tap_bridge} type bridge"),
            format!("ip link add name {tap_link} type veth peer name {network_end}"),
            format!("ip link set dev {tap_bridge} up"),
            format!("ip link set dev {tap_link} up"),
            format!("ip link set {node_end} master {tap_bridge}"),
            format!("ip link set {tap_link} master {tap_bridge}"),
        ] {
            let cmd = ctx.as_root(&cmd);
            ctx.run_host(&cmd)?;
        }
    } else {
        let cmd = ctx.as_root(&format!(
            "ip link add name {node_end} type veth peer name {network_end}"
        ));
        ctx.run_host(&cmd)?;
    }

    // Both ends stay down until the join brings them up in their final
    // namespaces.
    for end in [&node_end, &network_end] {
        let cmd = ctx.as_root(&format!("ip link set {end} down"));
        ctx.run_host(&cmd)?;
    }

    // ── post-check ───────────────────────────────────────────────────
    if !probe::link_exists(ctx, &mut doc, &link_id)? {
        return Err(CoreError::Consistency {
            message: format!("failed to create link '{link_id}'"),
        });
    }

    Ok(OpOutput::with_data(link_id))
}
