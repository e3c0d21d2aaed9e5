//! CLI error type with miette diagnostics.
//!
//! Maps engine errors into user-facing diagnostics with actionable help
//! text. Every fatal error exits with code 1; clap itself owns usage
//! errors (exit code 2).

use miette::Diagnostic;
use thiserror::Error;

use netforge_core::CoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Validation ───────────────────────────────────────────────────
    #[error("invalid {field}: {reason}")]
    #[diagnostic(code(netforge::validation))]
    Validation { field: String, reason: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{entity} '{id}' does not exist")]
    #[diagnostic(
        code(netforge::not_found),
        help("Run: netforge {entity} list to see what exists in this topology.")
    )]
    NotFound { entity: String, id: String },

    #[error("{entity} '{id}' already exists")]
    #[diagnostic(code(netforge::conflict))]
    Conflict { entity: String, id: String },

    // ── Locking ──────────────────────────────────────────────────────
    #[error("timed out waiting for the {domain} lock")]
    #[diagnostic(
        code(netforge::lock_timeout),
        help(
            "Another netforge process is holding the topology. If it died,\n\
             clear stale locks with: netforge state delete"
        )
    )]
    LockTimeout { domain: String },

    #[error("the {domain} lock is held by live process {pid}")]
    #[diagnostic(
        code(netforge::lock_held),
        help("Wait for the other netforge invocation to finish, or stop it.")
    )]
    LockHeld { domain: String, pid: i32 },

    // ── Environment ──────────────────────────────────────────────────
    #[error("command failed with status {status}: {command}")]
    #[diagnostic(
        code(netforge::command_failed),
        help(
            "netforge drives `ip`, `brctl`, and `iptables` as root.\n\
             Check that the tools are installed and sudo is available."
        )
    )]
    CommandFailed { command: String, status: i32 },

    #[error("topology and OS disagree: {message}")]
    #[diagnostic(
        code(netforge::consistency),
        help(
            "The environment drifted under netforge. Inspect with `ip netns list`\n\
             and `netforge state show`; `netforge state delete` resets everything."
        )
    )]
    Consistency { message: String },

    // ── State file ───────────────────────────────────────────────────
    #[error("state error: {0}")]
    #[diagnostic(code(netforge::state))]
    State(#[source] CoreError),

    #[error(transparent)]
    #[diagnostic(code(netforge::config))]
    Config(#[from] netforge_config::ConfigError),

    #[error("invalid JSON: {0}")]
    #[diagnostic(code(netforge::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Exit code for process termination: fatal errors are all 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, reason } => CliError::Validation { field, reason },

            CoreError::MissingResource { entity, id } => CliError::NotFound {
                entity: entity.to_owned(),
                id,
            },

            CoreError::AlreadyExists { entity, id } => CliError::Conflict {
                entity: entity.to_owned(),
                id,
            },

            CoreError::LockTimeout { domain, .. } => CliError::LockTimeout {
                domain: domain.to_string(),
            },

            CoreError::LockHeld { domain, pid } => CliError::LockHeld {
                domain: domain.to_string(),
                pid,
            },

            CoreError::CommandFailed { command, status } => {
                CliError::CommandFailed { command, status }
            }

            CoreError::Consistency { message } => CliError::Consistency { message },

            err @ (CoreError::StateRead { .. }
            | CoreError::StateWrite { .. }
            | CoreError::StateMalformed { .. }
            | CoreError::Exec(_)) => CliError::State(err),
        }
    }
}
