// Processor - one per job
//
// Shared scaffolding (state machine, cancellation, progress, completion) with
// a tagged body: `import` walks candidate versions, `export` composes entry by
// entry.

mod export;
mod import;

use super::panic_guard::{execute_guarded, PanicGuardResult};
use crate::domain::{
    CancelToken, ContactEntry, JobError, JobId, JobKind, JobOutcome, JobRequest,
};
use crate::port::{ContactStore, InterchangeCodec, JobListener, StreamProvider};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Collaborators every job body needs
#[derive(Clone)]
pub struct JobContext {
    pub codec: Arc<dyn InterchangeCodec>,
    pub store: Arc<dyn ContactStore>,
    pub streams: Arc<dyn StreamProvider>,
    pub listener: Arc<dyn JobListener>,
}

/// Receives the terminal outcome before the listener does
pub(crate) trait CompletionSink: Send + Sync {
    fn notify_finished(&self, job_id: JobId, outcome: &JobOutcome);
}

/// Lifecycle of a processor
///
/// Transitions only move forward: `Queued -> Running -> Done`, with
/// `Canceled` reachable from `Queued` or `Running` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorState {
    Queued = 0,
    Running = 1,
    Canceled = 2,
    Done = 3,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Queued,
            1 => ProcessorState::Running,
            2 => ProcessorState::Canceled,
            _ => ProcessorState::Done,
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    current: AtomicU64,
    total: AtomicU64,
}

/// Point-in-time view of a processor for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorSnapshot {
    pub job_id: JobId,
    pub kind: JobKind,
    pub label: String,
    pub state: ProcessorState,
    pub canceled: bool,
    pub current: u64,
    pub total: u64,
}

pub struct Processor {
    job_id: JobId,
    request: JobRequest,
    state: AtomicU8,
    cancel: CancelToken,
    progress: Progress,
    admitted: Notify,
    context: JobContext,
    completion: Weak<dyn CompletionSink>,
}

impl Processor {
    pub(crate) fn new(
        job_id: JobId,
        request: JobRequest,
        context: JobContext,
        completion: Weak<dyn CompletionSink>,
    ) -> Self {
        Self {
            job_id,
            request,
            state: AtomicU8::new(ProcessorState::Queued as u8),
            cancel: CancelToken::new(),
            progress: Progress::default(),
            admitted: Notify::new(),
            context,
            completion,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn kind(&self) -> JobKind {
        self.request.kind()
    }

    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_done(&self) -> bool {
        self.state() == ProcessorState::Done
    }

    /// True once cancellation was requested, even after the job is done
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// (current, total)
    pub fn progress(&self) -> (u64, u64) {
        (
            self.progress.current.load(Ordering::SeqCst),
            self.progress.total.load(Ordering::SeqCst),
        )
    }

    pub fn snapshot(&self) -> ProcessorSnapshot {
        let (current, total) = self.progress();
        ProcessorSnapshot {
            job_id: self.job_id,
            kind: self.kind(),
            label: self.request.label().to_string(),
            state: self.state(),
            canceled: self.is_canceled(),
            current,
            total,
        }
    }

    /// Request cancellation
    ///
    /// Returns false if the job is already done or already canceled. Never
    /// waits for the body to stop; the body and its codec session poll the
    /// token.
    pub fn cancel(&self) -> bool {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            match ProcessorState::from_u8(current) {
                ProcessorState::Queued | ProcessorState::Running => {
                    match self.state.compare_exchange(
                        current,
                        ProcessorState::Canceled as u8,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    ) {
                        Ok(_) => {
                            self.cancel.cancel();
                            info!(job_id = %self.job_id, "Cancellation requested");
                            return true;
                        }
                        Err(actual) => current = actual,
                    }
                }
                ProcessorState::Canceled | ProcessorState::Done => return false,
            }
        }
    }

    /// Allow the worker to start this job once the returned guard drops
    ///
    /// The guard is held across `on_queued`, and admits even if it unwinds.
    pub(crate) fn admission(&self) -> Admission<'_> {
        Admission(self)
    }

    pub(crate) async fn wait_admitted(&self) {
        self.admitted.notified().await;
    }

    /// Run the body to a terminal outcome and report it
    ///
    /// Completion reaches the registry exactly once, then the listener, even
    /// when the body panics.
    pub fn run(&self) -> JobOutcome {
        let _ = self.state.compare_exchange(
            ProcessorState::Queued as u8,
            ProcessorState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        info!(
            job_id = %self.job_id,
            kind = %self.kind(),
            label = %self.request.label(),
            "Job started"
        );

        let outcome = match execute_guarded(self.job_id, AssertUnwindSafe(|| self.execute())) {
            PanicGuardResult::Success(outcome) => outcome,
            PanicGuardResult::Panicked(msg) => JobOutcome::Failed(JobError::Internal(msg)),
        };

        // a cancel accepted at any point before Done reads as a cancel
        let prev = self
            .state
            .swap(ProcessorState::Done as u8, Ordering::SeqCst);
        let outcome = if prev == ProcessorState::Canceled as u8 || self.cancel.is_cancelled() {
            JobOutcome::Canceled
        } else {
            outcome
        };

        match self.completion.upgrade() {
            Some(sink) => sink.notify_finished(self.job_id, &outcome),
            None => warn!(job_id = %self.job_id, "Registry dropped before job finished"),
        }

        self.report(&outcome);
        outcome
    }

    fn execute(&self) -> JobOutcome {
        match &self.request {
            JobRequest::Import(job) => import::execute(self, job),
            JobRequest::Export(job) => export::execute(self, job),
        }
    }

    fn report(&self, outcome: &JobOutcome) {
        let listener = &self.context.listener;
        match outcome {
            JobOutcome::Succeeded(result) => {
                info!(job_id = %self.job_id, result = ?result, "Job finished");
                listener.on_finished(&self.request, self.job_id, result.as_ref());
            }
            JobOutcome::Failed(err) => {
                error!(job_id = %self.job_id, code = err.code(), "Job failed: {}", err);
                listener.on_failed(&self.request, Some(self.job_id), err);
            }
            JobOutcome::Canceled => {
                info!(job_id = %self.job_id, "Job canceled");
                listener.on_canceled(&self.request, self.job_id);
            }
        }
    }

    fn add_total(&self, count: u64) {
        self.progress.total.fetch_add(count, Ordering::SeqCst);
    }

    fn set_total(&self, count: u64) {
        self.progress.total.store(count, Ordering::SeqCst);
    }

    fn reset_current(&self) {
        self.progress.current.store(0, Ordering::SeqCst);
    }

    /// Count one processed entry and tell the listener
    fn advance(&self, entry: Option<&ContactEntry>) {
        let current = self.progress.current.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.progress.total.load(Ordering::SeqCst);
        self.context
            .listener
            .on_progress(&self.request, self.job_id, entry, current, total);
    }
}

pub(crate) struct Admission<'a>(&'a Processor);

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.0.admitted.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ExportFormat, ExportJob, FormatVersion, ImportJob, ImportSource, ResultRef,
    };
    use crate::port::codec::mocks::{ParseScript, ScriptedCodec};
    use crate::port::contact_store::mocks::InMemoryContactStore;
    use crate::port::listener::mocks::{JobEvent, RecordingListener};
    use crate::port::streams::mocks::MemoryStreams;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSink {
        finished: Mutex<Vec<(JobId, JobOutcome)>>,
    }

    impl CompletionSink for CountingSink {
        fn notify_finished(&self, job_id: JobId, outcome: &JobOutcome) {
            self.finished.lock().unwrap().push((job_id, outcome.clone()));
        }
    }

    struct Harness {
        codec: Arc<ScriptedCodec>,
        store: Arc<InMemoryContactStore>,
        streams: Arc<MemoryStreams>,
        listener: Arc<RecordingListener>,
        sink: Arc<CountingSink>,
    }

    impl Harness {
        fn new(codec: ScriptedCodec, store: InMemoryContactStore) -> Self {
            Self::with_streams(codec, store, MemoryStreams::new())
        }

        fn with_streams(
            codec: ScriptedCodec,
            store: InMemoryContactStore,
            streams: MemoryStreams,
        ) -> Self {
            Self {
                codec: Arc::new(codec),
                store: Arc::new(store),
                streams: Arc::new(streams),
                listener: Arc::new(RecordingListener::new()),
                sink: Arc::new(CountingSink::default()),
            }
        }

        fn processor(&self, job_id: JobId, request: JobRequest) -> Processor {
            let context = JobContext {
                codec: self.codec.clone(),
                store: self.store.clone(),
                streams: self.streams.clone(),
                listener: self.listener.clone(),
            };
            let sink: Arc<dyn CompletionSink> = self.sink.clone();
            Processor::new(job_id, request, context, Arc::downgrade(&sink))
        }

        fn finished(&self) -> Vec<(JobId, JobOutcome)> {
            self.sink.finished.lock().unwrap().clone()
        }
    }

    fn entries(names: &[&str]) -> ParseScript {
        ParseScript::Entries(names.iter().map(|n| ContactEntry::new(*n)).collect())
    }

    fn import(expected: u64) -> JobRequest {
        JobRequest::Import(
            ImportJob::new(ImportSource::from_bytes("BEGIN:VCARD"), "contacts.vcf")
                .with_expected_entries(expected),
        )
    }

    #[test]
    fn test_import_falls_back_to_second_version() {
        let h = Harness::new(
            ScriptedCodec::new().with_script(FormatVersion::V30, entries(&["Ada"])),
            InMemoryContactStore::new(),
        );
        let p = h.processor(1, import(1));

        let outcome = p.run();

        assert_eq!(outcome, JobOutcome::Succeeded(Some(ResultRef::Entry(1))));
        assert_eq!(h.codec.attempts(), vec![FormatVersion::V21, FormatVersion::V30]);
        assert_eq!(h.streams.sources_opened(), 2);
        assert!(p.is_done());
    }

    #[test]
    fn test_failed_candidate_does_not_leak_into_next_attempt() {
        let h = Harness::new(
            ScriptedCodec::new()
                .with_script(
                    FormatVersion::V21,
                    ParseScript::PartialThenMalformed(
                        vec![ContactEntry::new("Ada")],
                        "truncated card".into(),
                    ),
                )
                .with_script(FormatVersion::V30, entries(&["Ada"])),
            InMemoryContactStore::new(),
        );
        let p = h.processor(1, import(1));

        // the first commit (id 1) belongs to the failed 2.1 attempt
        assert_eq!(p.run(), JobOutcome::Succeeded(Some(ResultRef::Entry(2))));
        assert_eq!(p.progress(), (1, 1));
        assert_eq!(h.store.len(), 2);

        let progress: Vec<(u64, u64)> = h
            .listener
            .events_for(1)
            .into_iter()
            .filter_map(|e| match e {
                JobEvent::Progress { current, total, .. } => Some((current, total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 1), (1, 1)]);
    }

    #[test]
    fn test_import_three_entries_reports_progress_and_no_single_result() {
        let h = Harness::new(
            ScriptedCodec::new().with_script(FormatVersion::V21, entries(&["A", "B", "C"])),
            InMemoryContactStore::new(),
        );
        let p = h.processor(4, import(3));

        assert_eq!(p.run(), JobOutcome::Succeeded(None));

        let progress: Vec<(u64, u64)> = h
            .listener
            .events_for(4)
            .into_iter()
            .filter_map(|e| match e {
                JobEvent::Progress { current, total, .. } => Some((current, total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(
            h.listener.terminal_events(4),
            vec![JobEvent::Finished {
                job_id: 4,
                result: None
            }]
        );
        assert_eq!(h.store.len(), 3);
    }

    #[test]
    fn test_import_malformed_everywhere_fails_without_crashing() {
        let h = Harness::new(
            ScriptedCodec::new()
                .with_script(FormatVersion::V21, ParseScript::Malformed("bad line".into()))
                .with_script(FormatVersion::V30, ParseScript::Nested),
            InMemoryContactStore::new(),
        );
        let p = h.processor(1, import(0));

        match p.run() {
            JobOutcome::Failed(JobError::MalformedInput(_)) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.finished().len(), 1);
    }

    #[test]
    fn test_import_version_mismatch_everywhere_is_detection_failure() {
        let h = Harness::new(ScriptedCodec::new(), InMemoryContactStore::new());
        let p = h.processor(1, import(0));

        assert_eq!(p.run(), JobOutcome::Failed(JobError::VersionDetection));
    }

    #[test]
    fn test_import_explicit_version_tries_only_that_version() {
        let h = Harness::new(
            ScriptedCodec::new().with_script(FormatVersion::V21, entries(&["A"])),
            InMemoryContactStore::new(),
        );
        let request = JobRequest::Import(
            ImportJob::new(ImportSource::from_bytes("x"), "x")
                .with_version(crate::domain::VersionHint::V30),
        );

        assert_eq!(
            h.processor(1, request).run(),
            JobOutcome::Failed(JobError::VersionDetection)
        );
        assert_eq!(h.codec.attempts(), vec![FormatVersion::V30]);
    }

    #[test]
    fn test_import_canceled_before_start_skips_io() {
        let h = Harness::new(
            ScriptedCodec::new().with_script(FormatVersion::V21, entries(&["A"])),
            InMemoryContactStore::new(),
        );
        let p = h.processor(1, import(1));

        assert!(p.cancel());
        assert!(!p.cancel());
        assert_eq!(p.run(), JobOutcome::Canceled);

        assert_eq!(h.streams.sources_opened(), 0);
        assert!(h.codec.attempts().is_empty());
        assert_eq!(h.finished(), vec![(1, JobOutcome::Canceled)]);
        assert!(!p.cancel(), "done jobs cannot be canceled");
    }

    #[test]
    fn test_import_store_failure_is_terminal() {
        let h = Harness::new(
            ScriptedCodec::new()
                .with_script(FormatVersion::V21, entries(&["A"]))
                .with_script(FormatVersion::V30, entries(&["A"])),
            InMemoryContactStore::failing(),
        );

        match h.processor(1, import(1)).run() {
            JobOutcome::Failed(JobError::Store(_)) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.codec.attempts(), vec![FormatVersion::V21]);
    }

    #[test]
    fn test_import_missing_file_is_io_failure() {
        let h = Harness::new(ScriptedCodec::new(), InMemoryContactStore::new());
        let request = JobRequest::Import(ImportJob::new(
            ImportSource::File("/nope.vcf".into()),
            "nope.vcf",
        ));

        assert!(matches!(
            h.processor(1, request).run(),
            JobOutcome::Failed(JobError::Io(_))
        ));
    }

    #[test]
    fn test_panicking_body_still_completes_once() {
        let h = Harness::new(
            ScriptedCodec::new().with_script(FormatVersion::V21, ParseScript::Panic("boom".into())),
            InMemoryContactStore::new(),
        );
        let p = h.processor(9, import(0));

        assert_eq!(p.run(), JobOutcome::Failed(JobError::Internal("boom".into())));
        assert_eq!(h.finished().len(), 1);
        assert!(p.is_done());
        assert!(matches!(
            h.listener.terminal_events(9).as_slice(),
            [JobEvent::Failed { job_id: Some(9), .. }]
        ));
    }

    #[test]
    fn test_export_writes_every_entry() {
        let h = Harness::new(ScriptedCodec::new(), InMemoryContactStore::with_entries(3));
        let request = JobRequest::Export(ExportJob::new("/tmp/out.vcf", ExportFormat::V21Generic));
        let p = h.processor(2, request);

        assert_eq!(
            p.run(),
            JobOutcome::Succeeded(Some(ResultRef::File("/tmp/out.vcf".into())))
        );
        let written = h.streams.contents("/tmp/out.vcf").unwrap();
        assert_eq!(written.matches("BEGIN:MOCK").count(), 3);
        assert_eq!(p.progress(), (3, 3));
        assert!(h
            .listener
            .events_for(2)
            .iter()
            .all(|e| !matches!(e, JobEvent::Progress { entry_name: Some(_), .. })));
    }

    #[test]
    fn test_export_zero_entries_is_empty_result() {
        let h = Harness::new(ScriptedCodec::new(), InMemoryContactStore::new());
        let request = JobRequest::Export(ExportJob::new("/tmp/out.vcf", ExportFormat::V21Generic));

        assert_eq!(
            h.processor(1, request).run(),
            JobOutcome::Failed(JobError::EmptyResult)
        );
    }

    #[test]
    fn test_export_failures_are_classified() {
        let export = || JobRequest::Export(ExportJob::new("/ro/out.vcf", ExportFormat::V30Generic));

        let denied = Harness::with_streams(
            ScriptedCodec::new(),
            InMemoryContactStore::with_entries(1),
            MemoryStreams::new().deny("/ro/out.vcf"),
        );
        assert!(matches!(
            denied.processor(1, export()).run(),
            JobOutcome::Failed(JobError::Io(_))
        ));
        assert_eq!(denied.codec.composers_opened(), 0);

        let init = Harness::new(
            ScriptedCodec::new().with_init_failure("no cursor"),
            InMemoryContactStore::with_entries(1),
        );
        assert!(matches!(
            init.processor(1, export()).run(),
            JobOutcome::Failed(JobError::ComposerInit(_))
        ));

        let mid = Harness::new(
            ScriptedCodec::new().with_compose_failure_at(2),
            InMemoryContactStore::with_entries(4),
        );
        assert!(matches!(
            mid.processor(1, export()).run(),
            JobOutcome::Failed(JobError::ComposeEntry(_))
        ));
        assert_eq!(mid.listener.progress_count(1), 1);
    }

    #[test]
    fn test_cancel_during_export_keeps_partial_output() {
        let h = Harness::new(ScriptedCodec::new(), InMemoryContactStore::with_entries(5));
        let request = JobRequest::Export(ExportJob::new("/tmp/out.vcf", ExportFormat::V21Generic));
        let p = Arc::new(h.processor(3, request));

        let target = Arc::downgrade(&p);
        h.listener.on_progress_do(move |_, current| {
            if current == 2 {
                if let Some(p) = target.upgrade() {
                    p.cancel();
                }
            }
        });

        assert_eq!(p.run(), JobOutcome::Canceled);
        assert_eq!(h.listener.progress_count(3), 2);
        let written = h.streams.contents("/tmp/out.vcf").unwrap();
        assert_eq!(written.matches("BEGIN:MOCK").count(), 2);
    }

    #[test]
    fn test_accepted_cancel_always_reports_canceled() {
        for run in 0..500 {
            let h = Harness::new(ScriptedCodec::new(), InMemoryContactStore::with_entries(1));
            let request =
                JobRequest::Export(ExportJob::new("/tmp/out.vcf", ExportFormat::V21Generic));
            let p = Arc::new(h.processor(run, request));

            let canceller = {
                let p = p.clone();
                std::thread::spawn(move || {
                    let mut accepted = false;
                    while !p.is_done() {
                        accepted |= p.cancel();
                    }
                    accepted
                })
            };
            let outcome = p.run();
            let accepted = canceller.join().unwrap();

            assert_eq!(
                accepted,
                outcome == JobOutcome::Canceled,
                "run {}: cancel accepted = {}, outcome = {:?}",
                run,
                accepted,
                outcome
            );
            assert_eq!(h.finished(), vec![(run, outcome)]);
        }
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let h = Harness::new(ScriptedCodec::new(), InMemoryContactStore::new());
        let p = h.processor(5, import(2));

        let snap = p.snapshot();
        assert_eq!(snap.state, ProcessorState::Queued);
        assert_eq!(snap.kind, JobKind::Import);
        assert_eq!(snap.label, "contacts.vcf");

        p.cancel();
        assert_eq!(p.snapshot().state, ProcessorState::Canceled);
        p.run();
        let snap = p.snapshot();
        assert_eq!(snap.state, ProcessorState::Done);
        assert!(snap.canceled);
    }
}
