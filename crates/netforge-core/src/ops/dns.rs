//! Hand DNS nameservers to nodes through per-namespace resolv.conf files.
//!
//! `ip netns exec` bind-mounts `<nsroot>/<namespace>/resolv.conf` over
//! /etc/resolv.conf, so writing that file is all the plumbing a node
//! needs. The directory and file are created (and opened up) as root; the
//! content write itself then runs unprivileged.

use crate::addr;
use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::ops::validation;

pub struct DnsOptions {
    /// One node, or every node when absent.
    pub node_id: Option<String>,
    pub servers: Vec<String>,
    pub delete: bool,
}

pub fn dns(ctx: &Context, opts: &DnsOptions) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;

    // ── pre-check ────────────────────────────────────────────────────
    let mut servers = opts.servers.clone();
    if servers.is_empty() {
        servers = ctx.config().dns.clone();
    }
    if !opts.delete && servers.is_empty() {
        return Err(validation("dns", "no DNS servers listed"));
    }
    for server in &servers {
        if !addr::is_ipv4(server) {
            return Err(validation(
                "dns",
                format!("'{server}' is not a valid IPv4 address"),
            ));
        }
    }

    // ── per-node resolv.conf ─────────────────────────────────────────
    let targets = match &opts.node_id {
        Some(node_id) => vec![node_id.clone()],
        None => doc.node_ids(),
    };

    for node_id in targets {
        let prefix = ctx.unique_prefix(&mut doc, &node_id);
        let ns_dir = ctx.config().nsroot.join(&prefix);
        let resolv = ns_dir.join("resolv.conf");

        if opts.delete {
            if resolv.exists() {
                let cmd = ctx.as_root(&format!("rm {}", resolv.display()));
                ctx.run_host(&cmd)?;
            }
            continue;
        }

        if !ns_dir.is_dir() {
            let cmd = ctx.as_root(&format!("mkdir -p {}", ns_dir.display()));
            ctx.run_host(&cmd)?;
        }
        if !resolv.exists() {
            let cmd = ctx.as_root(&format!("touch {}", resolv.display()));
            ctx.run_host(&cmd)?;
        }
        let cmd = ctx.as_root(&format!("chmod 666 {}", resolv.display()));
        ctx.run_host(&cmd)?;

        let mut contents = String::new();
        for server in &servers {
            contents.push_str(&format!("nameserver {server}\n"));
        }
        std::fs::write(&resolv, contents).map_err(|source| CoreError::StateWrite {
            path: resolv.display().to_string(),
            source,
        })?;
    }

    // ── global record (whole-topology calls only) ────────────────────
    if opts.node_id.is_none() {
        doc.global.dns = if opts.delete { None } else { Some(servers) };
    }
    store.save(&doc)?;

    Ok(OpOutput::empty())
}
