// Job Worker - the single sequential execution loop

use crate::application::processor::Processor;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

/// Run queued processors one at a time until the queue closes
///
/// Job bodies block (stream I/O, codec, store), so each one is handed to the
/// blocking pool and awaited before the next is taken.
pub(super) async fn run(mut queue: UnboundedReceiver<Arc<Processor>>) {
    info!("Job worker started");

    while let Some(processor) = queue.recv().await {
        processor.wait_admitted().await;
        let job_id = processor.job_id();

        match tokio::task::spawn_blocking(move || processor.run()).await {
            Ok(outcome) => debug!(job_id = %job_id, outcome = %outcome, "Job body returned"),
            Err(join_err) if join_err.is_panic() => {
                error!(job_id = %job_id, "Job reporting panicked: {:?}", join_err)
            }
            Err(join_err) => error!(job_id = %job_id, "Job body aborted: {:?}", join_err),
        }
    }

    info!("Job worker stopped");
}
