//! Unified error type for adforge.
//!
//! Every failure a pipeline run can end with is one of these variants, and
//! each stage-level variant carries the [`StageKind`] it happened in so the
//! caller can report *which stage failed, and why*.

use std::time::Duration;

use crate::media::StageKind;

/// Unified error type covering all failure modes in adforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stage was rejected at start: malformed request or remote refusal.
    #[error("Submission failed [{stage}]: {message}")]
    Submission {
        stage: StageKind,
        message: String,
    },

    /// A status query failed. Transient: the poller retries on the next tick.
    #[error("Status query failed [{stage}]: {message}")]
    Poll {
        stage: StageKind,
        message: String,
    },

    /// The poll budget ran out before the job reached a terminal state.
    #[error("Timed out [{stage}]: no terminal state after {attempts} polls ({}s)", .waited.as_secs())]
    Timeout {
        stage: StageKind,
        attempts: u32,
        waited: Duration,
    },

    /// The backend reported the job as failed.
    #[error("Stage failed [{stage}]: {message}")]
    StageFailed {
        stage: StageKind,
        message: String,
    },

    /// A completed stage could not be handed to the next one.
    #[error("Propagation error [{stage}]: {message}")]
    Propagation {
        stage: StageKind,
        message: String,
    },

    /// The final artifact exists remotely but could not be transferred.
    #[error("Download failed [{locator}]: {message}")]
    Download {
        locator: String,
        message: String,
    },

    /// The run was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// Caller-supplied data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Submission`].
    pub fn submission(stage: StageKind, message: impl Into<String>) -> Self {
        Error::Submission {
            stage,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Poll`].
    pub fn poll(stage: StageKind, message: impl Into<String>) -> Self {
        Error::Poll {
            stage,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::StageFailed`].
    pub fn stage_failed(stage: StageKind, message: impl Into<String>) -> Self {
        Error::StageFailed {
            stage,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Propagation`].
    pub fn propagation(stage: StageKind, message: impl Into<String>) -> Self {
        Error::Propagation {
            stage,
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Download`].
    pub fn download(locator: impl ToString, message: impl Into<String>) -> Self {
        Error::Download {
            locator: locator.to_string(),
            message: message.into(),
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Error::Submission { stage, .. }
            | Error::Poll { stage, .. }
            | Error::Timeout { stage, .. }
            | Error::StageFailed { stage, .. }
            | Error::Propagation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The bare message without the stage prefix.
    ///
    /// For a remote stage failure this is exactly what the backend reported.
    pub fn message(&self) -> String {
        match self {
            Error::Submission { message, .. }
            | Error::Poll { message, .. }
            | Error::StageFailed { message, .. }
            | Error::Propagation { message, .. }
            | Error::Download { message, .. } => message.clone(),
            Error::Validation(m) | Error::Config(m) | Error::Internal(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Only status-query failures are recovered locally.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Poll { .. })
    }

    /// A download failure can be retried by re-fetching the same locator
    /// without re-running any stage.
    pub fn is_retriable_download(&self) -> bool {
        matches!(self, Error::Download { .. })
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) | Error::Config(_) => 2,
            Error::Submission { .. } => 3,
            Error::Poll { .. } | Error::Timeout { .. } => 4,
            Error::StageFailed { .. } | Error::Propagation { .. } => 5,
            Error::Download { .. } => 6,
            Error::Cancelled => 130,
            Error::Io { .. } | Error::Internal(_) => 1,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
