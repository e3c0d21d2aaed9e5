//! Integration tests for the `netforge` binary.
//!
//! These exercise argument parsing, help output, completions, read-only
//! listings, and error surfaces -- nothing that would touch the host's
//! real network configuration.
#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Build a command with env isolation: state lives in a temp directory
/// and no host configuration leaks in.
fn netforge_cmd(state_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("netforge").unwrap();
    cmd.env("HOME", state_dir)
        .env("XDG_CONFIG_HOME", state_dir.join("config"))
        .env("NETFORGE_STATE_DIR", state_dir.join("state"))
        .env("NETFORGE_STATE_ID", "test")
        .env_remove("NETFORGE_SUDO")
        .env_remove("NETFORGE_DNS");
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = netforge_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "expected usage exit code");
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "expected 'Usage' in output:\n{text}");
}

#[test]
fn help_lists_topology_commands() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("node")
            .and(predicate::str::contains("network"))
            .and(predicate::str::contains("link"))
            .and(predicate::str::contains("internet")),
    );
}

#[test]
fn version_flag() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netforge"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Read-only commands on an empty topology ─────────────────────────

#[test]
fn state_show_on_empty_topology() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["state", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"node\"").and(predicate::str::contains("\"network\"")),
        );
}

#[test]
fn node_list_on_empty_topology() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["node", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no nodes"));
}

#[test]
fn node_status_of_unknown_node_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = netforge_cmd(dir.path())
        .args(["node", "status", "ghost"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = String::from_utf8_lossy(&output.stderr);
    assert!(
        text.contains("ghost") && text.contains("does not exist"),
        "expected not-found diagnostic:\n{text}"
    );
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn config_show_renders_defaults() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("state_id"));
}

#[test]
fn config_path_prints_a_path() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = netforge_cmd(dir.path()).arg("frobnicate").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn network_add_requires_a_valid_type() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["network", "add", "net1", "--type", "token-ring"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("thread"));
}

#[test]
fn internet_connect_requires_a_seed() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["internet", "connect", "n1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--seed").or(predicate::str::contains("seed")));
}

#[test]
fn global_state_id_flag_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    netforge_cmd(dir.path())
        .args(["--state-id", "alpha", "node", "list"])
        .assert()
        .success();
}
