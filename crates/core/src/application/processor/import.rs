// Import body: candidate-version retry loop

use super::Processor;
use crate::domain::{
    AccountRef, ContactEntry, EntryId, ImportJob, JobError, JobId, JobOutcome, ResultRef,
};
use crate::port::{EntryInterpreter, InterpretError, ParseError};
use tracing::{debug, error, info, warn};

/// Commits each parsed entry and reports progress
struct CommittingInterpreter<'a> {
    processor: &'a Processor,
    account: Option<&'a AccountRef>,
    committed: Vec<EntryId>,
}

impl EntryInterpreter for CommittingInterpreter<'_> {
    fn on_entry(&mut self, entry: ContactEntry) -> Result<(), InterpretError> {
        if entry.is_ignorable() {
            debug!(job_id = %self.processor.job_id, "Skipping empty entry");
        } else {
            let id = self
                .processor
                .context
                .store
                .commit(&entry, self.account)
                .map_err(|e| InterpretError(e.to_string()))?;
            self.committed.push(id);
        }
        self.processor.advance(Some(&entry));
        Ok(())
    }
}

pub(super) fn execute(processor: &Processor, job: &ImportJob) -> JobOutcome {
    let job_id = processor.job_id;
    if processor.cancel.is_cancelled() {
        info!(job_id = %job_id, "Import canceled before start");
        return JobOutcome::Canceled;
    }

    processor.add_total(job.expected_entry_count);

    let candidates = job.version_hint.candidates();
    let mut interpreter = CommittingInterpreter {
        processor,
        account: job.target_account.as_ref(),
        committed: Vec::new(),
    };
    let mut last_error = JobError::VersionDetection;

    for (attempt, version) in candidates.iter().enumerate() {
        let is_last = attempt + 1 == candidates.len();

        // commits of a failed candidate stay in the store but not in the result
        if !interpreter.committed.is_empty() {
            warn!(
                job_id = %job_id,
                count = interpreter.committed.len(),
                "Previous candidate committed entries before failing"
            );
            interpreter.committed.clear();
        }
        processor.reset_current();

        // every candidate reads from the beginning
        let mut stream = match processor.context.streams.open_source(&job.source) {
            Ok(stream) => stream,
            Err(e) => {
                error!(job_id = %job_id, source = %job.source.describe(), "Cannot open import source: {}", e);
                return JobOutcome::Failed(JobError::Io(e.to_string()));
            }
        };
        let mut session = processor.context.codec.open_session(
            *version,
            job.estimated_charset.as_deref(),
            processor.cancel.clone(),
        );

        debug!(job_id = %job_id, version = %version, "Parsing import source");
        match session.parse(stream.as_mut(), &mut interpreter) {
            Ok(()) => return succeeded(job_id, &interpreter.committed),
            Err(ParseError::VersionMismatch(msg)) => {
                if is_last {
                    error!(job_id = %job_id, version = %version, "Version mismatch on last candidate: {}", msg);
                } else {
                    info!(job_id = %job_id, version = %version, "Version mismatch, trying next candidate");
                }
                last_error = JobError::VersionDetection;
            }
            Err(
                ParseError::Malformed(msg) | ParseError::Nested(msg) | ParseError::NotSupported(msg),
            ) => {
                warn!(job_id = %job_id, version = %version, "Unreadable under this version: {}", msg);
                last_error = JobError::MalformedInput(msg);
            }
            Err(ParseError::Io(e)) => {
                warn!(job_id = %job_id, version = %version, "Read error: {}", e);
                last_error = JobError::Io(e.to_string());
            }
            Err(ParseError::Canceled) => {
                info!(job_id = %job_id, "Import canceled during parse");
                return JobOutcome::Canceled;
            }
            Err(ParseError::Interpreter(e)) => {
                error!(job_id = %job_id, "Store rejected entry: {}", e);
                return JobOutcome::Failed(JobError::Store(e.0));
            }
        }

        if processor.cancel.is_cancelled() {
            return JobOutcome::Canceled;
        }
    }

    JobOutcome::Failed(last_error)
}

/// A single committed entry is the result; zero or several yield none
fn succeeded(job_id: JobId, committed: &[EntryId]) -> JobOutcome {
    match committed {
        [id] => JobOutcome::Succeeded(Some(ResultRef::Entry(*id))),
        [] => {
            warn!(job_id = %job_id, "Import finished without committing any entry");
            JobOutcome::Succeeded(None)
        }
        many => {
            info!(job_id = %job_id, count = many.len(), "Import committed entries");
            JobOutcome::Succeeded(None)
        }
    }
}
