// Export body: entry-by-entry composition into the reserved destination

use super::Processor;
use crate::domain::{ExportJob, JobError, JobOutcome, ResultRef};
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};

pub(super) fn execute(processor: &Processor, job: &ExportJob) -> JobOutcome {
    let job_id = processor.job_id;
    if processor.cancel.is_cancelled() {
        info!(job_id = %job_id, "Export canceled before start");
        return JobOutcome::Canceled;
    }

    let mut out = match processor.context.streams.open_destination(&job.destination) {
        Ok(out) => out,
        Err(e) => {
            error!(job_id = %job_id, destination = %job.destination, "Cannot open destination: {}", e);
            return JobOutcome::Failed(JobError::Io(e.to_string()));
        }
    };

    let mut composer = match processor
        .context
        .codec
        .open_composer(job.format, Arc::clone(&processor.context.store))
    {
        Ok(composer) => composer,
        Err(e) => return JobOutcome::Failed(JobError::ComposerInit(e.to_string())),
    };

    let total = composer.total() as u64;
    if total == 0 {
        return JobOutcome::Failed(JobError::EmptyResult);
    }
    processor.set_total(total);

    loop {
        // partial output stays on disk when canceled
        if processor.cancel.is_cancelled() {
            info!(job_id = %job_id, written = processor.progress().0, "Export canceled");
            return JobOutcome::Canceled;
        }

        let composed = match composer.compose_next() {
            Ok(Some(composed)) => composed,
            Ok(None) => break,
            Err(e) => return JobOutcome::Failed(JobError::ComposeEntry(e.to_string())),
        };

        if let Err(e) = out.write_all(composed.text.as_bytes()) {
            return JobOutcome::Failed(JobError::Io(e.to_string()));
        }
        processor.advance(None);
    }

    if let Err(e) = out.flush() {
        return JobOutcome::Failed(JobError::Io(e.to_string()));
    }

    JobOutcome::Succeeded(Some(ResultRef::File(job.destination.clone())))
}
