//! Start, stop, and wait on daemons inside nodes.
//!
//! A daemon record stores the pid *and* the kernel create time; every
//! later signal or wait re-verifies the pairing so a recycled PID is
//! never touched. Stopping escalates: a quiescence signal first
//! (SIGUSR1, which a well-behaved test process may catch to flush and
//! exit), then SIGTERM, then SIGKILL, each with its own grace window.

use std::time::{Duration, Instant};

use chrono::Utc;
use netforge_exec::proc;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{CoreError, OpOutput};
use crate::lock::LockDomain;
use crate::model::ProcessRecord;
use crate::ops::{self, probe, validation};

pub struct ProcessStartOptions {
    pub node_id: String,
    /// Daemon name, unique per node.
    pub tag: String,
    pub command: String,
    pub env: Vec<(String, String)>,
}

pub struct ProcessWaitOptions {
    pub node_id: String,
    pub tag: String,
    pub timeout: Option<Duration>,
}

/// Grace window per escalation step.
const SIGNAL_GRACE: Duration = Duration::from_secs(30);
const POLL: Duration = Duration::from_millis(100);

pub fn process_start(ctx: &Context, opts: &ProcessStartOptions) -> Result<OpOutput, CoreError> {
    let _guard = ctx.locks().acquire(LockDomain::State)?;
    let store = ctx.store();
    let mut doc = store.load()?;
    let node_id = opts.node_id.as_str();
    let tag = opts.tag.as_str();

    // ── pre-check ────────────────────────────────────────────────────
    if tag.is_empty() {
        return Err(validation("tag", "missing name of the new process"));
    }
    if opts.command.is_empty() {
        return Err(validation("command", "missing process command"));
    }
    if process_alive(&doc, node_id, tag) {
        info!("[{node_id}] process '{tag}' already exists, replacing it");
        ops::process_stop(ctx, node_id, tag)?;
        doc = store.load()?;
    }

    let output_file = ctx.config().process_log_dir.join(format!(
        "netforge_{:06}_{}_{tag}.out",
        std::process::id(),
        Utc::now().timestamp_micros()
    ));

    // ── spawn ────────────────────────────────────────────────────────
    let cmd = if doc.is_local_node(node_id) {
        opts.command.clone()
    } else {
        let prefix = ctx.unique_prefix(&mut doc, node_id);
        ctx.as_root(&format!("ip netns exec {prefix} {}", opts.command))
    };
    debug!("[{node_id}] starting daemon '{tag}': {cmd}");

    let handle = ctx
        .executor()
        .spawn_daemon(&cmd, &opts.env, &output_file)?;

    // ── record ───────────────────────────────────────────────────────
    if let Some(node) = doc.node_mut(node_id) {
        node.process.insert(
            tag.to_owned(),
            ProcessRecord {
                pid: handle.pid,
                create_time: handle.create_time,
                out: output_file.display().to_string(),
                command: opts.command.clone(),
                started_at: Utc::now(),
            },
        );
    } else {
        return Err(CoreError::MissingResource {
            entity: "node",
            id: node_id.to_owned(),
        });
    }
    store.save(&doc)?;

    Ok(OpOutput::with_data(handle.pid.to_string()))
}

pub fn process_stop(ctx: &Context, node_id: &str, tag: &str) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let doc = store.load()?;

    // ── pre-check ────────────────────────────────────────────────────
    if tag.is_empty() {
        return Err(validation("tag", "missing name of the process to stop"));
    }

    let record = doc
        .node(node_id)
        .and_then(|node| node.process.get(tag))
        .cloned();

    if let Some(record) = &record {
        if proc::alive(record.pid, record.create_time) {
            debug!("[{node_id}] stopping process '{tag}' (pid {})", record.pid);
            terminate_tree(ctx, record.pid, record.create_time)?;
        } else {
            debug!("[{node_id}] process '{tag}' is no longer running");
        }
    } else {
        debug!("[{node_id}] no record of process '{tag}'");
    }

    // The record goes regardless; it described a process that is now
    // certainly gone.
    if record.is_some() {
        let _guard = ctx.locks().acquire(LockDomain::State)?;
        let mut doc = store.load()?;
        if let Some(node) = doc.node_mut(node_id) {
            node.process.remove(tag);
        }
        store.save(&doc)?;
    }

    Ok(OpOutput::empty())
}

pub fn process_wait(ctx: &Context, opts: &ProcessWaitOptions) -> Result<OpOutput, CoreError> {
    let store = ctx.store();
    let mut doc = store.load()?;
    let node_id = opts.node_id.as_str();
    let tag = opts.tag.as_str();

    // ── pre-check ────────────────────────────────────────────────────
    if tag.is_empty() {
        return Err(validation("tag", "missing name of the process to wait on"));
    }
    if !probe::node_exists(ctx, &mut doc, node_id)? {
        return Err(CoreError::MissingResource {
            entity: "node",
            id: node_id.to_owned(),
        });
    }

    let Some(record) = doc
        .node(node_id)
        .and_then(|node| node.process.get(tag))
        .cloned()
    else {
        debug!("[{node_id}] process '{tag}' already completed");
        return Ok(OpOutput::empty());
    };

    debug!("[{node_id}] waiting for process '{tag}' to complete");
    let started = Instant::now();
    while proc::alive(record.pid, record.create_time) {
        if let Some(timeout) = opts.timeout {
            if started.elapsed() > timeout {
                info!("[{node_id}] wait on '{tag}' timed out, terminating it");
                terminate_tree(ctx, record.pid, record.create_time)?;
                break;
            }
        }
        std::thread::sleep(POLL);
    }

    Ok(OpOutput::empty())
}

fn process_alive(doc: &crate::model::StateDocument, node_id: &str, tag: &str) -> bool {
    doc.node(node_id)
        .and_then(|node| node.process.get(tag))
        .is_some_and(|record| proc::alive(record.pid, record.create_time))
}

/// Escalating termination of a process tree. Signals go through the
/// executor as `kill` commands so they can be escalated to root.
fn terminate_tree(ctx: &Context, pid: i32, create_time: u64) -> Result<(), CoreError> {
    for signal in ["USR1", "TERM", "KILL"] {
        let tree = proc::process_tree(pid, create_time);
        if tree.is_empty() {
            return Ok(());
        }

        for target in &tree {
            let cmd = ctx.as_root(&format!("kill -{signal} {target}"));
            if let Err(err) = ctx.run_host(&cmd) {
                warn!("failed to send SIG{signal} to {target}: {err}");
            }
        }

        let deadline = Instant::now() + SIGNAL_GRACE;
        while Instant::now() < deadline {
            if !proc::alive(pid, create_time) {
                return Ok(());
            }
            std::thread::sleep(POLL);
        }
        warn!("process {pid} ignored SIG{signal}, escalating");
    }

    if proc::alive(pid, create_time) {
        return Err(CoreError::Consistency {
            message: format!("process {pid} survived the termination sequence"),
        });
    }
    Ok(())
}
