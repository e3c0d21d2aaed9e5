//! End-to-end orchestrator tests against the simulated host.
//!
//! Every test drives the real orchestrators -- locks, state store, probes,
//! and generated commands included -- with only the OS swapped out.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use netforge_config::Config;
use netforge_core::{Context, LockManager, NetworkType, NodeType, ops};
use netforge_exec::SimulatedExecutor;
use tempfile::TempDir;

fn test_context() -> (TempDir, Arc<SimulatedExecutor>, Context) {
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
    let sim = Arc::new(SimulatedExecutor::new());
    let ctx = Context::with_locks(config, locks, Box::new(Arc::clone(&sim)));
    (dir, sim, ctx)
}

fn add_node(ctx: &Context, id: &str) {
    ops::node_add(ctx, &ops::NodeAddOptions::new(id, NodeType::Plain)).unwrap();
}

fn add_network(ctx: &Context, id: &str, network_type: NetworkType) {
    ops::network_add(ctx, &ops::NetworkAddOptions::new(id, network_type)).unwrap();
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[test]
fn join_and_leave_update_both_sides() {
    let (_dir, sim, ctx) = test_context();

    add_node(&ctx, "n1");
    add_network(&ctx, "net1", NetworkType::Wifi);
    assert!(sim.namespace_exists("net000"));
    assert!(sim.namespace_exists("net001"));

    ops::node_join(&ctx, &ops::NodeJoinOptions::new("n1", "net1")).unwrap();
    let doc = ctx.store().load().unwrap();
    assert_eq!(doc.node_network_ids("n1"), vec!["net1"]);
    assert_eq!(doc.network_node_ids("net1"), vec!["n1"]);
    // The node-side interface got the medium's name.
    assert!(sim.interface_exists("net000", "wlan0"));

    ops::node_leave(&ctx, "n1", Some("net1")).unwrap();
    let doc = ctx.store().load().unwrap();
    assert!(doc.node_network_ids("n1").is_empty());
    assert!(doc.network_node_ids("net1").is_empty());
    assert!(!sim.interface_exists("net000", "wlan0"));

    ops::node_delete(&ctx, "n1").unwrap();
    let doc = ctx.store().load().unwrap();
    assert!(doc.node_ids().is_empty());
    assert!(!sim.namespace_exists("net000"));
}

#[test]
fn network_delete_cascades_to_links() {
    let (_dir, _sim, ctx) = test_context();

    add_node(&ctx, "n1");
    add_network(&ctx, "net1", NetworkType::Thread);
    ops::node_join(&ctx, &ops::NodeJoinOptions::new("n1", "net1")).unwrap();

    ops::network_delete(&ctx, "net1").unwrap();
    let doc = ctx.store().load().unwrap();
    assert!(doc.network_ids().is_empty());
    assert!(doc.link_ids().is_empty());
    // The node survives, with no dangling interface record.
    assert_eq!(doc.node_ids(), vec!["n1"]);
    assert!(doc.node("n1").unwrap().interface.is_empty());
}

// ── Idempotent deletes ──────────────────────────────────────────────

#[test]
fn deleting_nonexistent_resources_is_a_warned_noop() {
    let (_dir, _sim, ctx) = test_context();

    add_node(&ctx, "n1");
    let before = serde_json::to_value(ctx.store().load().unwrap()).unwrap();

    ops::node_delete(&ctx, "ghost").unwrap();
    ops::network_delete(&ctx, "ghostnet").unwrap();
    ops::link_delete(&ctx, "wifi9").unwrap();

    let after = serde_json::to_value(ctx.store().load().unwrap()).unwrap();
    assert_eq!(before, after);
}

// ── Crash recovery ──────────────────────────────────────────────────

#[test]
fn phantom_record_is_absorbed_by_the_next_add() {
    let (_dir, sim, ctx) = test_context();

    // Simulate a crash between the state write and namespace creation:
    // the record exists, the namespace never did.
    {
        let store = ctx.store();
        let mut doc = store.load().unwrap();
        netforge_core::ident::short_id(&mut doc, "n1");
        doc.node
            .insert("n1".into(), netforge_core::Node::new(NodeType::Plain));
        store.save(&doc).unwrap();
    }
    assert!(!sim.namespace_exists("net000"));

    add_node(&ctx, "n1");

    let doc = ctx.store().load().unwrap();
    assert_eq!(doc.node_ids(), vec!["n1"]);
    assert_eq!(doc.netns.len(), 1);
}

#[test]
fn failed_creation_is_fatal_and_leaves_the_record() {
    let (_dir, sim, ctx) = test_context();
    sim.fail_commands_containing("netns add");

    let err = ops::node_add(&ctx, &ops::NodeAddOptions::new("n1", NodeType::Plain))
        .expect_err("creation must fail the post-check");
    assert!(matches!(err, netforge_core::CoreError::Consistency { .. }));

    // The record was deliberately left in place for the next command.
    let doc = ctx.store().load().unwrap();
    assert_eq!(doc.node_ids(), vec!["n1"]);
}

// ── Link numbering through the orchestrators ────────────────────────

#[test]
fn link_numbers_reuse_gaps_after_deletion() {
    let (_dir, _sim, ctx) = test_context();

    let opts = ops::LinkAddOptions {
        link_type: NetworkType::Wan,
        tap: false,
    };
    let first = ops::link_add(&ctx, &opts).unwrap().data.unwrap();
    let second = ops::link_add(&ctx, &opts).unwrap().data.unwrap();
    assert_eq!(first, "wan0");
    assert_eq!(second, "wan1");

    ops::link_delete(&ctx, "wan0").unwrap();
    let third = ops::link_add(&ctx, &opts).unwrap().data.unwrap();
    assert_eq!(third, "wan0");
}

// ── Addressing ──────────────────────────────────────────────────────

#[test]
fn network_prefix_addresses_members_and_later_joiners() {
    let (_dir, _sim, ctx) = test_context();

    add_network(&ctx, "net1", NetworkType::Wifi);
    add_node(&ctx, "n1");
    ops::node_join(&ctx, &ops::NodeJoinOptions::new("n1", "net1")).unwrap();

    ops::network_address(
        &ctx,
        &ops::NetworkAddressOptions {
            network_id: "net1".into(),
            address: "10.0.1.0/24".into(),
            delete: false,
        },
    )
    .unwrap();

    let doc = ctx.store().load().unwrap();
    // Host ids start at 2; .1 is left for gateways.
    assert_eq!(
        doc.node_interface_addresses("n1", "wlan0"),
        vec!["10.0.1.2"]
    );
    assert!(doc.network("net1").unwrap().prefix.contains_key("10.0.1"));

    // A later join picks the next host id from the recorded prefix.
    add_node(&ctx, "n2");
    ops::node_join(&ctx, &ops::NodeJoinOptions::new("n2", "net1")).unwrap();
    let doc = ctx.store().load().unwrap();
    assert_eq!(
        doc.node_interface_addresses("n2", "wlan0"),
        vec!["10.0.1.3"]
    );
}

#[test]
fn node_route_via_gateway_node_resolves_its_address() {
    let (_dir, _sim, ctx) = test_context();

    add_network(&ctx, "net1", NetworkType::Wifi);
    add_node(&ctx, "gw");
    add_node(&ctx, "n2");
    ops::node_join(&ctx, &ops::NodeJoinOptions::new("gw", "net1")).unwrap();
    ops::node_join(&ctx, &ops::NodeJoinOptions::new("n2", "net1")).unwrap();
    ops::network_address(
        &ctx,
        &ops::NetworkAddressOptions {
            network_id: "net1".into(),
            address: "10.0.1.0/24".into(),
            delete: false,
        },
    )
    .unwrap();

    ops::node_route(
        &ctx,
        &ops::NodeRouteOptions {
            node_id: "n2".into(),
            to: "default".into(),
            via: "gw".into(),
            prefix: None,
            delete: false,
            record: true,
        },
    )
    .unwrap();

    let doc = ctx.store().load().unwrap();
    let record = doc.node("n2").unwrap().route.get("default_v4").unwrap();
    assert_eq!(record.via.as_deref(), Some("gw"));
}

// ── ISP pool lifecycle ──────────────────────────────────────────────

#[test]
fn internet_connect_and_last_consumer_teardown() {
    let (_dir, sim, ctx) = test_context();

    add_node(&ctx, "n1");
    let result = ops::internet_connect(
        &ctx,
        &ops::InternetOptions {
            node_id: Some("n1".into()),
            isp_id: "eth".into(),
            seed: 9,
            iface: None,
        },
    )
    .unwrap();

    // Slot 0 (172.16.9.1) is the uplink; the first node gets .2.
    assert_eq!(result.data.as_deref(), Some("172.16.9.2"));
    assert!(sim.namespace_exists("ethBridge"));

    let isp_doc = ctx.isp_store("eth").load().unwrap();
    assert!(isp_doc.global_isp.isp[0].occupy);
    assert!(isp_doc.global_isp.isp[1].occupy);
    assert!(!isp_doc.global_isp.isp[2].occupy);
    assert_eq!(isp_doc.global_isp.firewall_rules.len(), 3);

    let doc = ctx.store().load().unwrap();
    assert_eq!(doc.global.internet.get("eth").unwrap().node_id, "n1");

    // A second connection under an already-active ISP id is refused.
    let err = ops::internet_connect(
        &ctx,
        &ops::InternetOptions {
            node_id: Some("n1".into()),
            isp_id: "eth".into(),
            seed: 9,
            iface: None,
        },
    )
    .expect_err("already connected");
    assert!(matches!(err, netforge_core::CoreError::AlreadyExists { .. }));

    ops::internet_disconnect(
        &ctx,
        &ops::InternetOptions {
            node_id: None,
            isp_id: "eth".into(),
            seed: 9,
            iface: None,
        },
    )
    .unwrap();

    // Last consumer gone: uplink torn down, pool cleared, record removed.
    assert!(!sim.namespace_exists("ethBridge"));
    let isp_doc = ctx.isp_store("eth").load().unwrap();
    assert!(isp_doc.global_isp.isp.is_empty());
    let doc = ctx.store().load().unwrap();
    assert!(doc.global.internet.is_empty());
}

// ── DNS ─────────────────────────────────────────────────────────────

#[test]
fn dns_records_globally_and_writes_resolv_conf() {
    let (dir, _sim, ctx) = test_context();

    add_node(&ctx, "n1");
    ops::dns(
        &ctx,
        &ops::DnsOptions {
            node_id: None,
            servers: vec!["8.8.8.8".into(), "1.1.1.1".into()],
            delete: false,
        },
    )
    .unwrap();

    let doc = ctx.store().load().unwrap();
    assert_eq!(
        doc.global.dns,
        Some(vec!["8.8.8.8".into(), "1.1.1.1".into()])
    );

    let resolv = dir.path().join("netns").join("net000").join("resolv.conf");
    let contents = std::fs::read_to_string(resolv).unwrap();
    assert_eq!(contents, "nameserver 8.8.8.8\nnameserver 1.1.1.1\n");

    // Nodes added later inherit the recorded servers.
    add_node(&ctx, "n2");
    let resolv = dir.path().join("netns").join("net001").join("resolv.conf");
    assert!(resolv.exists());

    let err = ops::dns(
        &ctx,
        &ops::DnsOptions {
            node_id: None,
            servers: vec!["not-an-address".into()],
            delete: false,
        },
    )
    .expect_err("invalid nameserver");
    assert!(matches!(err, netforge_core::CoreError::Validation { .. }));
}

// ── Whole-state teardown ────────────────────────────────────────────

#[test]
fn state_delete_tears_everything_down() {
    let (_dir, sim, ctx) = test_context();

    add_node(&ctx, "n1");
    add_network(&ctx, "net1", NetworkType::Wifi);
    ops::node_join(&ctx, &ops::NodeJoinOptions::new("n1", "net1")).unwrap();

    ops::state_delete(&ctx).unwrap();

    assert!(!ctx.store().path().exists());
    assert!(!sim.namespace_exists("net000"));
    assert!(!sim.namespace_exists("net001"));
}
