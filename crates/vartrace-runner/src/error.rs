//! Runner error types.
//!
//! These are failures of the execution machinery itself. A program that
//! does not compile, crashes or runs out of time is not an error here; it
//! is a [`RunOutcome`](crate::runner::RunOutcome).

/// Errors that prevent an execution from being attempted or observed.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The temporary workspace could not be created or written.
    #[error("workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    /// A toolchain produced an empty command line for a required stage.
    #[error("empty {stage} command")]
    EmptyCommand { stage: &'static str },

    /// The process could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a started process failed.
    #[error("failed to wait on '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A requested input or output file name escapes the workspace.
    #[error("invalid workspace file name: '{0}'")]
    InvalidFileName(String),
}
