//! Create a virtual node (a network namespace).

use tracing::warn;

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::model::{Node, NodeType};
use crate::ops::{self, probe, validation};

pub struct NodeAddOptions {
    pub node_id: String,
    pub node_type: NodeType,
}

impl NodeAddOptions {
    pub fn new(node_id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            node_id: node_id.into(),
            node_type,
        }
    }
}

pub fn node_add(ctx: &Context, opts: &NodeAddOptions) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;
    let node_id = opts.node_id.as_str();

    // ── pre-check ────────────────────────────────────────────────────
    if node_id.is_empty() {
        return Err(validation("node_id", "missing name of the new virtual node"));
    }
    if addr::is_domain_name(node_id) {
        return Err(validation("node_id", "using . (dot) in the name is not allowed"));
    }

    // A leftover namespace or a phantom record (say, from a crash between
    // the state write and namespace creation) is absorbed by the
    // idempotent delete before we start over.
    if probe::node_exists(ctx, &mut doc, node_id)? || doc.node.contains_key(node_id) {
        warn!("[{node_id}] virtual node already exists");
        ops::node_delete(ctx, node_id)?;
        doc = store.load()?;
    }

    // ── state record before the namespace ────────────────────────────
    // If this process dies between the write and the `ip netns add`, the
    // record is visible and a later delete absorbs it; the other order
    // would leak an invisible namespace.
    let prefix = ctx.unique_prefix(&mut doc, node_id);
    doc.node.insert(node_id.to_owned(), Node::new(opts.node_type));
    store.save(&doc)?;

    // ── OS creation ──────────────────────────────────────────────────
    if !opts.node_type.is_local() {
        let cmd = ctx.as_root(&format!("ip netns add {prefix}"));
        ctx.run_host(&cmd)?;
    }

    // ── post-check ───────────────────────────────────────────────────
    if !opts.node_type.is_local() && !probe::node_exists(ctx, &mut doc, node_id)? {
        return Err(CoreError::Consistency {
            message: format!("failed to create virtual node '{node_id}'"),
        });
    }

    if !opts.node_type.is_local() {
        let cmd = ctx.as_root("ifconfig lo up");
        ctx.run_at_node(&mut doc, node_id, &cmd)?;
    }

    if opts.node_type == NodeType::Ap {
        for key in ["net.ipv6.conf.all.forwarding", "net.ipv4.ip_forward"] {
            let cmd = ctx.as_root(&format!("sysctl -n -w {key}=1"));
            ctx.run_at_node(&mut doc, node_id, &cmd)?;
        }
    }

    // New nodes inherit the topology-wide DNS configuration.
    if let Some(servers) = doc.global.dns.clone() {
        ops::dns(
            ctx,
            &ops::DnsOptions {
                node_id: Some(node_id.to_owned()),
                servers,
                delete: false,
            },
        )?;
    }

    Ok(OpOutput::empty())
}
