//! Cross-process serialization tests for the lock manager.
//!
//! Each thread builds its own `LockManager` over the same state file, so
//! contention goes through the OS flock exactly as it does between
//! independent command processes.
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::time::Duration;

use netforge_core::{LockDomain, LockManager};

fn manager(state_file: &PathBuf) -> LockManager {
    LockManager::with_poll_interval(state_file, Duration::from_millis(1))
}

#[test]
fn concurrent_guarded_increments_lose_no_updates() {
    const THREADS: usize = 8;
    const INCREMENTS: usize = 25;

    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("t.json");
    let counter_file = dir.path().join("counter");
    std::fs::write(&counter_file, "0").unwrap();

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            let state_file = state_file.clone();
            let counter_file = counter_file.clone();
            scope.spawn(move || {
                let locks = manager(&state_file);
                for _ in 0..INCREMENTS {
                    let _guard = locks.acquire(LockDomain::State).unwrap();
                    let value: u64 = std::fs::read_to_string(&counter_file)
                        .unwrap()
                        .trim()
                        .parse()
                        .unwrap();
                    std::fs::write(&counter_file, (value + 1).to_string()).unwrap();
                }
            });
        }
    });

    let total: u64 = std::fs::read_to_string(&counter_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(total, (THREADS * INCREMENTS) as u64);
}

#[test]
fn nested_acquisition_does_not_deadlock_under_contention() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("t.json");

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let state_file = state_file.clone();
            scope.spawn(move || {
                let locks = manager(&state_file);
                for _ in 0..10 {
                    let outer = locks.acquire(LockDomain::State).unwrap();
                    // A composite orchestrator re-entering its own domain.
                    let inner = locks.acquire(LockDomain::State).unwrap();
                    drop(inner);
                    drop(outer);
                }
            });
        }
    });
}

#[test]
fn bounded_retry_eventually_fails() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("t.json");

    let holder = manager(&state_file);
    let _held = holder.acquire(LockDomain::State).unwrap();

    // 100 attempts at 1ms each: fails fast, and with the right error.
    let contender = manager(&state_file);
    let err = contender
        .acquire(LockDomain::State)
        .expect_err("must time out");
    assert!(matches!(
        err,
        netforge_core::CoreError::LockTimeout { .. }
    ));
}
