// Domain Error Types

use thiserror::Error;

/// Why a submission never reached the queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionError {
    #[error("job queue is closed")]
    Closed,

    #[error("destination {path} is already reserved by job {owner}")]
    DestinationInUse { path: String, owner: u64 },
}

/// Terminal failure of a job
///
/// Cancellation is not an error; see [`super::JobOutcome::Canceled`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("{0}")]
    Rejected(#[from] RejectionError),

    #[error("no candidate format version could read the source")]
    VersionDetection,

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("nothing to export")]
    EmptyResult,

    #[error("composer initialization failed: {0}")]
    ComposerInit(String),

    #[error("failed to compose entry: {0}")]
    ComposeEntry(String),

    #[error("contact store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Stable machine-readable code (used by the RPC status board)
    pub fn code(&self) -> &'static str {
        match self {
            JobError::Rejected(RejectionError::Closed) => "REJECTED",
            JobError::Rejected(RejectionError::DestinationInUse { .. }) => "DESTINATION_IN_USE",
            JobError::VersionDetection => "VERSION_DETECTION",
            JobError::MalformedInput(_) => "MALFORMED_INPUT",
            JobError::Io(_) => "IO",
            JobError::EmptyResult => "EMPTY_RESULT",
            JobError::ComposerInit(_) => "COMPOSER_INIT",
            JobError::ComposeEntry(_) => "COMPOSE_ENTRY",
            JobError::Store(_) => "STORE",
            JobError::Internal(_) => "INTERNAL",
        }
    }
}
