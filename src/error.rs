//! Typed failures raised by the switching core.
//!
//! Severity decides the daemon's reaction: fatal errors end the process,
//! transient errors are superseded by the next poll tick, soft errors are
//! logged and skipped.

use thiserror::Error;

/// Result alias for the switching core.
pub type SwitchResult<T> = std::result::Result<T, SwitchError>;

/// Failures from backend resolution, window queries, and switch commands.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// The session/display-server combination has no usable switching tool.
    #[error("unsupported session: {0}")]
    Unsupported(String),

    /// A required external command is not on `PATH`.
    #[error("required command '{0}' is not installed")]
    MissingTool(String),

    /// Window or sink enumeration failed.
    #[error("querying {tool} failed: {reason}")]
    QueryFailed { tool: String, reason: String },

    /// A switch command exited non-zero.
    #[error("'{command}' failed: {reason}")]
    ExecutionFailed { command: String, reason: String },

    /// An external command ran past its time budget and was killed.
    #[error("'{command}' did not finish within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// No audio sink block contained the configured label.
    #[error("no audio sink matches label '{0}'")]
    SinkNotFound(String),
}

/// How the daemon reacts to a [`SwitchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// End the process with a non-zero exit; no degraded mode exists.
    Fatal,
    /// Log and carry on; the next poll tick reissues the relevant command.
    Transient,
    /// Log and skip; current device state is left untouched.
    Soft,
}

impl SwitchError {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Unsupported(_) | Self::MissingTool(_) => Severity::Fatal,
            Self::QueryFailed { .. } | Self::ExecutionFailed { .. } | Self::Timeout { .. } => {
                Severity::Transient
            }
            Self::SinkNotFound(_) => Severity::Soft,
        }
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
