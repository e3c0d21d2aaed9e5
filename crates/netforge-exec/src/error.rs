use thiserror::Error;

/// Failures raised at the OS boundary.
///
/// A command that *runs* but exits non-zero is not an error at this layer --
/// the caller inspects `CommandOutput::status` and decides severity. Only
/// failures to launch or observe a process surface here.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to open output file {path}: {source}")]
    OutputFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read command output: {0}")]
    Io(#[from] std::io::Error),
}
