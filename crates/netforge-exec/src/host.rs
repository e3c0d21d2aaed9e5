//! Real executor backed by `std::process::Command`.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::{CommandOutput, DaemonHandle, ExecError, Executor, proc};

/// Runs command lines on the local host.
///
/// Each line is whitespace-split into argv, so arguments must not contain
/// embedded spaces -- the same contract the topology engine's generated
/// `ip`/`brctl`/`iptables` lines satisfy by construction.
pub struct HostExecutor {
    /// Tag attached to every traced command, usually the state id.
    tag: String,
}

impl HostExecutor {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    fn command_for(cmd: &str, env: &[(String, String)]) -> Result<Command, ExecError> {
        let mut parts = cmd.split_whitespace();
        let program = parts.next().ok_or(ExecError::EmptyCommand)?;
        let mut command = Command::new(program);
        command.args(parts);
        for (key, value) in env {
            command.env(key, value);
        }
        Ok(command)
    }
}

impl Executor for HostExecutor {
    fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        self.run_with_env(cmd, &[])
    }

    fn run_with_env(
        &self,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<CommandOutput, ExecError> {
        debug!("[{}] > {cmd}", self.tag);

        let output = Self::command_for(cmd, env)?
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExecError::Spawn {
                command: cmd.into(),
                source,
            })?;

        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in result.stdout.lines().chain(result.stderr.lines()) {
            if !line.is_empty() {
                debug!("[{}]      {line}", self.tag);
            }
        }
        if !result.success() {
            warn!("[{}] command exited {}: {cmd}", self.tag, result.status);
        }

        Ok(result)
    }

    fn spawn_daemon(
        &self,
        cmd: &str,
        env: &[(String, String)],
        output: &Path,
    ) -> Result<DaemonHandle, ExecError> {
        debug!("[{}] spawn > {cmd}", self.tag);

        let out_file = File::create(output).map_err(|source| ExecError::OutputFile {
            path: output.display().to_string(),
            source,
        })?;
        let err_file = out_file.try_clone()?;

        let child = Self::command_for(cmd, env)?
            .stdin(Stdio::piped())
            .stdout(out_file)
            .stderr(err_file)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: cmd.into(),
                source,
            })?;

        // The child stays observable in /proc until waited on, so the
        // create-time read cannot race with an early exit.
        let pid = i32::try_from(child.id()).unwrap_or(i32::MAX);
        let create_time = proc::create_time(pid).unwrap_or(0);

        Ok(DaemonHandle { pid, create_time })
    }
}
