// Domain Layer - Jobs, entries and outcomes

pub mod cancel;
pub mod entry;
pub mod error;
pub mod job;
pub mod outcome;

// Re-exports
pub use cancel::CancelToken;
pub use entry::{ContactEntry, EntryId, Property};
pub use error::{JobError, RejectionError};
pub use job::{
    AccountRef, ExportFormat, ExportJob, FormatVersion, ImportJob, ImportSource, JobId, JobKind,
    JobRequest, VersionHint,
};
pub use outcome::{JobOutcome, ResultRef};
