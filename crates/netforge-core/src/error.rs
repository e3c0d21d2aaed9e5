// ── Core error taxonomy ──
//
// One rule shapes this enum: "not found" is only an error when the caller
// *required* the resource. Idempotent delete paths never see an error for a
// missing resource -- pre-checks hand them a `Presence` value instead and
// they proceed as a warned no-op.

use thiserror::Error;

use crate::lock::LockDomain;

/// Unified error type for the topology engine.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Pre-check failures (nothing mutated) ─────────────────────────
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity} '{id}' does not exist")]
    MissingResource { entity: &'static str, id: String },

    #[error("{entity} '{id}' already exists")]
    AlreadyExists { entity: &'static str, id: String },

    // ── Locking ──────────────────────────────────────────────────────
    #[error("timed out waiting for the {domain} lock after {waited_secs}s")]
    LockTimeout { domain: LockDomain, waited_secs: u64 },

    #[error("the {domain} lock is held by live process {pid}; refusing to break it")]
    LockHeld { domain: LockDomain, pid: i32 },

    // ── External command execution ───────────────────────────────────
    #[error("command failed with status {status}: {command}")]
    CommandFailed { command: String, status: i32 },

    #[error(transparent)]
    Exec(#[from] netforge_exec::ExecError),

    // ── Post-check failures (mutation happened, left in place) ───────
    #[error("consistency check failed: {message}")]
    Consistency { message: String },

    // ── State document ───────────────────────────────────────────────
    #[error("failed to read state document {path}: {source}")]
    StateRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state document {path}: {source}")]
    StateWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("state document {path} is malformed: {source}")]
    StateMalformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of a tolerant existence pre-check.
///
/// Delete orchestrators treat `Missing` as "warn and skip the OS step, but
/// still clear the state record" -- deletion stays idempotent without
/// abusing the error channel for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Missing,
}

impl Presence {
    pub fn is_missing(self) -> bool {
        self == Self::Missing
    }
}

/// Structured result of one orchestrated operation: success value plus an
/// optional payload for in-process callers (e.g. the allocated link id).
#[derive(Debug, Clone, Default)]
pub struct OpOutput {
    pub data: Option<String>,
}

impl OpOutput {
    pub fn empty() -> Self {
        Self { data: None }
    }

    pub fn with_data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}
