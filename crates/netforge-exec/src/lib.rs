// netforge-exec: the OS boundary.
//
// Everything that touches a real shell command, a /proc entry, or a signal
// lives here. The topology engine upstream only sees the `Executor` trait
// and the line parsers -- it never builds a `std::process::Command` itself.

pub mod host;
pub mod parse;
pub mod proc;
pub mod sim;

mod error;

pub use error::ExecError;
pub use host::HostExecutor;
pub use sim::SimulatedExecutor;

use std::path::Path;

/// Captured result of one external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Handle to a long-lived process spawned inside the topology.
///
/// `create_time` is the kernel start time of the child (clock ticks since
/// boot, `/proc/<pid>/stat` field 22). Together with the PID it identifies
/// the process across command invocations even if the PID is later reused.
#[derive(Debug, Clone, Copy)]
pub struct DaemonHandle {
    pub pid: i32,
    pub create_time: u64,
}

/// Executes command lines on behalf of the topology engine.
///
/// Commands are full command lines, whitespace-split before execution.
/// Namespace scoping and privilege escalation are already baked into the
/// line by the caller; the executor runs exactly what it is handed.
pub trait Executor {
    /// Run a command to completion and capture its output.
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError>;

    /// Run with extra environment variables set for the child.
    fn run_with_env(&self, cmd: &str, env: &[(String, String)])
    -> Result<CommandOutput, ExecError>;

    /// Spawn a long-lived process, detached from this command invocation,
    /// with stdout/stderr redirected to `output`.
    fn spawn_daemon(
        &self,
        cmd: &str,
        env: &[(String, String)],
        output: &Path,
    ) -> Result<DaemonHandle, ExecError>;
}

// Shared executors: callers keep a handle while the engine owns another.
impl<T: Executor + ?Sized> Executor for std::sync::Arc<T> {
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        (**self).run(cmd)
    }

    fn run_with_env(
        &self,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<CommandOutput, ExecError> {
        (**self).run_with_env(cmd, env)
    }

    fn spawn_daemon(
        &self,
        cmd: &str,
        env: &[(String, String)],
        output: &Path,
    ) -> Result<DaemonHandle, ExecError> {
        (**self).spawn_daemon(cmd, env, output)
    }
}
