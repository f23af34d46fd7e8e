// Job Listener Port
// Progress and completion callbacks toward whatever presents jobs to a user.

use crate::domain::{ContactEntry, JobError, JobId, JobRequest, ResultRef};

/// Listener interface
///
/// Calls come synchronously from the worker thread (or from the submitting
/// thread for `on_queued` and rejections); implementations hand off to their
/// own threads if presentation needs it.
pub trait JobListener: Send + Sync {
    /// Job accepted; `sequence` is its index inside a batch submission
    fn on_queued(&self, request: &JobRequest, job_id: JobId, sequence: usize);

    /// One entry processed. `entry` is set for imports only.
    fn on_progress(
        &self,
        request: &JobRequest,
        job_id: JobId,
        entry: Option<&ContactEntry>,
        current: u64,
        total: u64,
    );

    fn on_finished(&self, request: &JobRequest, job_id: JobId, result: Option<&ResultRef>);

    /// Terminal failure, or a rejected submission (`job_id` is `None` then)
    fn on_failed(&self, request: &JobRequest, job_id: Option<JobId>, error: &JobError);

    fn on_canceled(&self, request: &JobRequest, job_id: JobId);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Event captured by [`RecordingListener`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum JobEvent {
        Queued {
            job_id: JobId,
            sequence: usize,
        },
        Progress {
            job_id: JobId,
            entry_name: Option<String>,
            current: u64,
            total: u64,
        },
        Finished {
            job_id: JobId,
            result: Option<ResultRef>,
        },
        Failed {
            job_id: Option<JobId>,
            error: JobError,
        },
        Canceled {
            job_id: JobId,
        },
    }

    impl JobEvent {
        pub fn job_id(&self) -> Option<JobId> {
            match self {
                JobEvent::Queued { job_id, .. }
                | JobEvent::Progress { job_id, .. }
                | JobEvent::Finished { job_id, .. }
                | JobEvent::Canceled { job_id } => Some(*job_id),
                JobEvent::Failed { job_id, .. } => *job_id,
            }
        }

        pub fn is_terminal(&self) -> bool {
            matches!(
                self,
                JobEvent::Finished { .. } | JobEvent::Failed { .. } | JobEvent::Canceled { .. }
            )
        }
    }

    type ProgressHook = Box<dyn Fn(JobId, u64) + Send + Sync>;

    /// Listener that records every callback
    #[derive(Default)]
    pub struct RecordingListener {
        events: Mutex<Vec<JobEvent>>,
        changed: Notify,
        progress_hook: Mutex<Option<ProgressHook>>,
    }

    impl RecordingListener {
        pub fn new() -> Self {
            Self::default()
        }

        /// Run `hook(job_id, current)` after every progress event
        pub fn on_progress_do(&self, hook: impl Fn(JobId, u64) + Send + Sync + 'static) {
            *self.progress_hook.lock().unwrap() = Some(Box::new(hook));
        }

        pub fn events(&self) -> Vec<JobEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn events_for(&self, job_id: JobId) -> Vec<JobEvent> {
            self.events()
                .into_iter()
                .filter(|e| e.job_id() == Some(job_id))
                .collect()
        }

        pub fn progress_count(&self, job_id: JobId) -> usize {
            self.events_for(job_id)
                .iter()
                .filter(|e| matches!(e, JobEvent::Progress { .. }))
                .count()
        }

        pub fn terminal_events(&self, job_id: JobId) -> Vec<JobEvent> {
            self.events_for(job_id)
                .into_iter()
                .filter(JobEvent::is_terminal)
                .collect()
        }

        /// Wait until the job reported a terminal event
        pub async fn wait_terminal(&self, job_id: JobId) -> JobEvent {
            loop {
                let notified = self.changed.notified();
                if let Some(event) = self.terminal_events(job_id).into_iter().next() {
                    return event;
                }
                notified.await;
            }
        }

        fn record(&self, event: JobEvent) {
            self.events.lock().unwrap().push(event);
            self.changed.notify_waiters();
        }
    }

    impl JobListener for RecordingListener {
        fn on_queued(&self, _request: &JobRequest, job_id: JobId, sequence: usize) {
            self.record(JobEvent::Queued { job_id, sequence });
        }

        fn on_progress(
            &self,
            _request: &JobRequest,
            job_id: JobId,
            entry: Option<&ContactEntry>,
            current: u64,
            total: u64,
        ) {
            self.record(JobEvent::Progress {
                job_id,
                entry_name: entry.map(|e| e.display_name.clone()),
                current,
                total,
            });
            if let Some(hook) = self.progress_hook.lock().unwrap().as_ref() {
                hook(job_id, current);
            }
        }

        fn on_finished(&self, _request: &JobRequest, job_id: JobId, result: Option<&ResultRef>) {
            self.record(JobEvent::Finished {
                job_id,
                result: result.cloned(),
            });
        }

        fn on_failed(&self, _request: &JobRequest, job_id: Option<JobId>, error: &JobError) {
            self.record(JobEvent::Failed {
                job_id,
                error: error.clone(),
            });
        }

        fn on_canceled(&self, _request: &JobRequest, job_id: JobId) {
            self.record(JobEvent::Canceled { job_id });
        }
    }
}
