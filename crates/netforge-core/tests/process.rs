//! Daemon lifecycle tests on a local-type node.
//!
//! Local nodes execute directly on the host, so these tests spawn and
//! terminate real processes without namespaces or privileges.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use netforge_config::Config;
use netforge_core::{Context, LockManager, NodeType, ops};
use netforge_exec::{HostExecutor, proc};
use tempfile::TempDir;

fn host_context() -> (TempDir, Context) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        state_id: "net".into(),
        state_dir: dir.path().join("state"),
        sudo: Some(String::new()),
        nsroot: dir.path().join("netns"),
        process_log_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let locks = LockManager::with_poll_interval(&config.state_file(), Duration::from_millis(2));
    let executor = HostExecutor::new("net");
    let ctx = Context::with_locks(config, locks, Box::new(executor));
    (dir, ctx)
}

fn pid_of(ctx: &Context, node: &str, tag: &str) -> (i32, u64) {
    let doc = ctx.store().load().unwrap();
    let record = doc.node(node).unwrap().process.get(tag).unwrap().clone();
    (record.pid, record.create_time)
}

#[test]
fn start_records_a_live_process_and_stop_terminates_it() {
    let (_dir, ctx) = host_context();
    ops::node_add(&ctx, &ops::NodeAddOptions::new("host", NodeType::Local)).unwrap();

    ops::process_start(
        &ctx,
        &ops::ProcessStartOptions {
            node_id: "host".into(),
            tag: "sleeper".into(),
            command: "sleep 300".into(),
            env: Vec::new(),
        },
    )
    .unwrap();

    let (pid, create_time) = pid_of(&ctx, "host", "sleeper");
    assert!(proc::alive(pid, create_time), "daemon should be running");

    ops::process_stop(&ctx, "host", "sleeper").unwrap();
    assert!(!proc::alive(pid, create_time), "daemon should be gone");

    let doc = ctx.store().load().unwrap();
    assert!(doc.node("host").unwrap().process.is_empty());
}

#[test]
fn wait_returns_once_the_process_exits() {
    let (_dir, ctx) = host_context();
    ops::node_add(&ctx, &ops::NodeAddOptions::new("host", NodeType::Local)).unwrap();

    ops::process_start(
        &ctx,
        &ops::ProcessStartOptions {
            node_id: "host".into(),
            tag: "quick".into(),
            command: "sleep 0.2".into(),
            env: Vec::new(),
        },
    )
    .unwrap();

    ops::process_wait(
        &ctx,
        &ops::ProcessWaitOptions {
            node_id: "host".into(),
            tag: "quick".into(),
            timeout: Some(Duration::from_secs(30)),
        },
    )
    .unwrap();

    let (pid, create_time) = pid_of(&ctx, "host", "quick");
    assert!(!proc::alive(pid, create_time));
}

#[test]
fn stopping_a_dead_record_is_tolerated() {
    let (_dir, ctx) = host_context();
    ops::node_add(&ctx, &ops::NodeAddOptions::new("host", NodeType::Local)).unwrap();

    ops::process_start(
        &ctx,
        &ops::ProcessStartOptions {
            node_id: "host".into(),
            tag: "gone".into(),
            command: "true".into(),
            env: Vec::new(),
        },
    )
    .unwrap();

    // Let the (instant) process exit, then stop its stale record.
    std::thread::sleep(Duration::from_millis(200));
    ops::process_stop(&ctx, "host", "gone").unwrap();

    let doc = ctx.store().load().unwrap();
    assert!(doc.node("host").unwrap().process.is_empty());
}
