// ── Cross-process lock manager ──
//
// Three named advisory locks guard the shared state: `state` for the
// document and general topology edits, `rt` for kernel routing-table
// edits (not safely concurrent across namespaces sharing a kernel), and
// `isp` for the uplink address pool. Each is an OS flock on its own file,
// so any process touching the same state file interoperates.
//
// Within one process the manager is re-entrant per domain: nested
// acquisitions bump a counter, and the OS lock is taken only on the 0->1
// transition and dropped only on 1->0. Composite orchestrators rely on
// this when they call lower-level orchestrators under an already-held lock.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rustix::fs::{FlockOperation, flock};
use strum::Display;
use tracing::{error, warn};

use crate::error::CoreError;

/// The three independent mutual-exclusion scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LockDomain {
    State,
    Rt,
    Isp,
}

impl LockDomain {
    const ALL: [Self; 3] = [Self::State, Self::Rt, Self::Isp];

    fn index(self) -> usize {
        match self {
            Self::State => 0,
            Self::Rt => 1,
            Self::Isp => 2,
        }
    }

    /// Bounded retry budget before an acquire becomes fatal. Topology
    /// edits give up quickly; routing and pool operations are brief, so
    /// contenders wait much longer before concluding something is wrong.
    fn max_attempts(self) -> u32 {
        match self {
            Self::State => 100,
            Self::Rt | Self::Isp => 5000,
        }
    }

    fn lock_path(self, state_file: &Path) -> PathBuf {
        let mut name = state_file.as_os_str().to_owned();
        match self {
            Self::State => name.push(".lock"),
            Self::Rt => name.push(".rt.lock"),
            Self::Isp => name.push(".isp.lock"),
        }
        PathBuf::from(name)
    }
}

struct DomainSlot {
    path: PathBuf,
    /// Held open (and flocked) while `count > 0`.
    file: Option<File>,
    count: u32,
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const WARN_EVERY: u32 = 10;

/// Re-entrant, cross-process lock manager.
///
/// One instance is owned by the command context and passed explicitly to
/// orchestrators; there is no process-global lock table.
pub struct LockManager {
    slots: [Mutex<DomainSlot>; 3],
    poll_interval: Duration,
}

impl LockManager {
    pub fn new(state_file: &Path) -> Self {
        Self::with_poll_interval(state_file, POLL_INTERVAL)
    }

    /// Same manager with a custom retry interval (tests shrink it).
    pub fn with_poll_interval(state_file: &Path, poll_interval: Duration) -> Self {
        let slot = |domain: LockDomain| {
            Mutex::new(DomainSlot {
                path: domain.lock_path(state_file),
                file: None,
                count: 0,
            })
        };
        Self {
            slots: [
                slot(LockDomain::State),
                slot(LockDomain::Rt),
                slot(LockDomain::Isp),
            ],
            poll_interval,
        }
    }

    /// Acquire `domain`, blocking with bounded retry. The returned guard
    /// releases on drop, on every exit path.
    pub fn acquire(&self, domain: LockDomain) -> Result<LockGuard<'_>, CoreError> {
        let mut attempts: u32 = 0;

        loop {
            {
                let mut slot = self.slot(domain);

                if slot.count > 0 {
                    // Re-entrant: this call chain already holds the domain.
                    slot.count += 1;
                    return Ok(LockGuard {
                        manager: self,
                        domain,
                    });
                }

                let file = open_lock_file(&slot.path)?;
                match flock(&file, FlockOperation::NonBlockingLockExclusive) {
                    Ok(()) => {
                        record_holder_pid(&file);
                        slot.file = Some(file);
                        slot.count = 1;
                        return Ok(LockGuard {
                            manager: self,
                            domain,
                        });
                    }
                    Err(rustix::io::Errno::WOULDBLOCK | rustix::io::Errno::INTR) => {}
                    Err(errno) => {
                        return Err(CoreError::StateWrite {
                            path: slot.path.display().to_string(),
                            source: std::io::Error::from(errno),
                        });
                    }
                }
            }

            attempts += 1;
            let waited = self.poll_interval * attempts;
            if attempts >= domain.max_attempts() {
                let emsg = format!(
                    "waited on the {domain} lock for over {:.1}s, giving up",
                    waited.as_secs_f64()
                );
                error!("{emsg}");
                return Err(CoreError::LockTimeout {
                    domain,
                    waited_secs: waited.as_secs(),
                });
            }
            if attempts % WARN_EVERY == 0 {
                warn!(
                    "waiting for the {domain} lock for over {:.1}s",
                    waited.as_secs_f64()
                );
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Operator escape hatch for stale lock files.
    ///
    /// Unlike the unconditional break it replaces, this refuses to discard
    /// a lock whose recorded holder is still alive -- it only clears lock
    /// files nothing holds anymore.
    pub fn break_lock(&self, domain: LockDomain) -> Result<(), CoreError> {
        let slot = self.slot(domain);
        if !slot.path.exists() {
            return Ok(());
        }

        let file = open_lock_file(&slot.path)?;
        match flock(&file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {
                // Nothing holds it; clear the stale file.
                let _ = std::fs::remove_file(&slot.path);
                let _ = flock(&file, FlockOperation::Unlock);
                Ok(())
            }
            Err(_) => {
                let pid = read_holder_pid(&slot.path).unwrap_or(0);
                if pid > 0 && !netforge_exec::proc::pid_alive(pid) {
                    // Held, but the recorded holder is gone; an inherited
                    // descriptor keeps the flock alive. Leave it alone.
                    warn!("{domain} lock held by unknown process (recorded holder {pid} is dead)");
                }
                Err(CoreError::LockHeld { domain, pid })
            }
        }
    }

    /// Break every domain's stale lock, failing on the first live holder.
    pub fn break_all(&self) -> Result<(), CoreError> {
        for domain in LockDomain::ALL {
            self.break_lock(domain)?;
        }
        Ok(())
    }

    /// Current re-entrancy depth for a domain (diagnostics and tests).
    pub fn held_depth(&self, domain: LockDomain) -> u32 {
        self.slot(domain).count
    }

    fn release(&self, domain: LockDomain) {
        let mut slot = self.slot(domain);
        match slot.count {
            0 => warn!("release of the {domain} lock without a matching acquire"),
            1 => {
                if let Some(file) = slot.file.take() {
                    let _ = flock(&file, FlockOperation::Unlock);
                }
                slot.count = 0;
            }
            _ => slot.count -= 1,
        }
    }

    fn slot(&self, domain: LockDomain) -> std::sync::MutexGuard<'_, DomainSlot> {
        self.slots[domain.index()]
            .lock()
            .expect("lock manager poisoned")
    }
}

/// Scoped lock handle; dropping it releases the domain.
#[must_use = "the lock is released when the guard drops"]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    domain: LockDomain,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(self.domain);
    }
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

fn open_lock_file(path: &Path) -> Result<File, CoreError> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| CoreError::StateWrite {
            path: path.display().to_string(),
            source,
        })
}

fn record_holder_pid(mut file: &File) {
    let _ = file.set_len(0);
    let _ = write!(file, "{}", std::process::id());
    let _ = file.flush();
}

fn read_holder_pid(path: &Path) -> Option<i32> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path) -> LockManager {
        LockManager::with_poll_interval(&dir.join("t.json"), Duration::from_millis(2))
    }

    #[test]
    fn reentrant_acquire_releases_at_outermost() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locks = manager(dir.path());

        let outer = locks.acquire(LockDomain::State).expect("outer");
        let inner = locks.acquire(LockDomain::State).expect("inner");
        assert_eq!(locks.held_depth(LockDomain::State), 2);

        drop(inner);
        assert_eq!(locks.held_depth(LockDomain::State), 1);
        drop(outer);
        assert_eq!(locks.held_depth(LockDomain::State), 0);

        // Released for real: another manager can take it immediately.
        let other = manager(dir.path());
        drop(other.acquire(LockDomain::State).expect("reacquire"));
    }

    #[test]
    fn domains_are_independent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locks = manager(dir.path());
        let other = manager(dir.path());

        let _state = locks.acquire(LockDomain::State).expect("state");
        // A different domain is not contended by the state holder.
        drop(other.acquire(LockDomain::Isp).expect("isp"));
    }

    #[test]
    fn break_refuses_live_holder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locks = manager(dir.path());
        let other = manager(dir.path());

        let _held = locks.acquire(LockDomain::State).expect("held");
        let err = other.break_lock(LockDomain::State).expect_err("live holder");
        match err {
            CoreError::LockHeld { pid, .. } => {
                assert_eq!(pid, i32::try_from(std::process::id()).expect("pid"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn break_clears_stale_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locks = manager(dir.path());

        // A lock file left behind with no flock on it.
        let path = LockDomain::State.lock_path(&dir.path().join("t.json"));
        std::fs::write(&path, "999999").expect("write");

        locks.break_lock(LockDomain::State).expect("break");
        assert!(!path.exists());
    }
}
