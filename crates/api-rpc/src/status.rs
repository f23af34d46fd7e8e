//! Status Board
//!
//! Listener that remembers what happened to each job so `job.status.v1` can
//! answer after the job has left the registry.

use crate::types::JobStatus;
use carddock_core::application::{ProcessorSnapshot, ProcessorState};
use carddock_core::domain::{ContactEntry, JobError, JobId, JobRequest, ResultRef};
use carddock_core::port::JobListener;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Finished jobs kept before the oldest is forgotten
const MAX_RETAINED_FINISHED: usize = 256;

pub const STATE_QUEUED: &str = "QUEUED";
pub const STATE_RUNNING: &str = "RUNNING";
pub const STATE_SUCCEEDED: &str = "SUCCEEDED";
pub const STATE_FAILED: &str = "FAILED";
pub const STATE_CANCELED: &str = "CANCELED";

#[derive(Default)]
struct Board {
    jobs: HashMap<JobId, JobStatus>,
    finished: VecDeque<JobId>,
}

#[derive(Default)]
pub struct StatusBoard {
    board: Mutex<Board>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: JobId) -> Option<JobStatus> {
        self.lock().jobs.get(&job_id).cloned()
    }

    /// Every known job, oldest first
    pub fn all(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self.lock().jobs.values().cloned().collect();
        jobs.sort_by_key(|status| status.job_id);
        jobs
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, job_id: JobId, apply: impl FnOnce(&mut JobStatus)) {
        let mut board = self.lock();
        match board.jobs.get_mut(&job_id) {
            Some(status) => apply(status),
            None => warn!(job_id = %job_id, "Status update for unknown job"),
        }
    }

    fn finish(&self, job_id: JobId, apply: impl FnOnce(&mut JobStatus)) {
        self.update(job_id, apply);

        let mut board = self.lock();
        board.finished.push_back(job_id);
        while board.finished.len() > MAX_RETAINED_FINISHED {
            if let Some(oldest) = board.finished.pop_front() {
                board.jobs.remove(&oldest);
            }
        }
    }
}

/// Overlay live registry state on a board entry that has not finished yet
pub fn merge_snapshot(status: &mut JobStatus, snapshot: &ProcessorSnapshot) {
    if status.state != STATE_QUEUED && status.state != STATE_RUNNING {
        return;
    }
    status.state = match snapshot.state {
        ProcessorState::Queued => STATE_QUEUED,
        ProcessorState::Running => STATE_RUNNING,
        ProcessorState::Canceled => STATE_CANCELED,
        // terminal report is on its way
        ProcessorState::Done => return,
    }
    .to_string();
    status.current = snapshot.current;
    status.total = snapshot.total;
}

impl JobListener for StatusBoard {
    fn on_queued(&self, request: &JobRequest, job_id: JobId, sequence: usize) {
        debug!(job_id = %job_id, sequence, "Job queued");
        self.lock().jobs.insert(
            job_id,
            JobStatus {
                job_id,
                kind: request.kind().to_string(),
                label: request.label().to_string(),
                state: STATE_QUEUED.to_string(),
                current: 0,
                total: 0,
                result: None,
                error_code: None,
                error_message: None,
            },
        );
    }

    fn on_progress(
        &self,
        _request: &JobRequest,
        job_id: JobId,
        _entry: Option<&ContactEntry>,
        current: u64,
        total: u64,
    ) {
        self.update(job_id, |status| {
            status.state = STATE_RUNNING.to_string();
            status.current = current;
            status.total = total;
        });
    }

    fn on_finished(&self, _request: &JobRequest, job_id: JobId, result: Option<&ResultRef>) {
        let result = result.and_then(|r| serde_json::to_value(r).ok());
        self.finish(job_id, |status| {
            status.state = STATE_SUCCEEDED.to_string();
            status.result = result;
        });
    }

    fn on_failed(&self, request: &JobRequest, job_id: Option<JobId>, error: &JobError) {
        let Some(job_id) = job_id else {
            debug!(label = %request.label(), "Submission rejected: {}", error);
            return;
        };
        self.finish(job_id, |status| {
            status.state = STATE_FAILED.to_string();
            status.error_code = Some(error.code().to_string());
            status.error_message = Some(error.to_string());
        });
    }

    fn on_canceled(&self, _request: &JobRequest, job_id: JobId) {
        self.finish(job_id, |status| status.state = STATE_CANCELED.to_string());
    }
}
