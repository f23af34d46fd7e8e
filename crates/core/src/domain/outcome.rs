// Job Outcome

use super::{EntryId, JobError};
use serde::Serialize;

/// What a successful job points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultRef {
    /// The single entry an import committed
    Entry(EntryId),
    /// The file an export wrote
    File(String),
}

/// Terminal outcome of a processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// `None` when an import committed zero or several entries
    Succeeded(Option<ResultRef>),
    Failed(JobError),
    Canceled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded(_) => "SUCCEEDED",
            JobOutcome::Failed(_) => "FAILED",
            JobOutcome::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Failed(err) => write!(f, "FAILED ({})", err),
            other => f.write_str(other.label()),
        }
    }
}
