// Job Registry & Executor
//
// Owns the job map, the destination reservations and the single worker.
// Every mutation of that state goes through one coarse lock; listener and
// host callbacks are always made outside of it.

mod reservation;
mod worker;

pub use reservation::ReservationTable;

use super::constants::FIRST_JOB_ID;
use super::destination::{DestinationError, ExportNaming};
use super::processor::{CompletionSink, JobContext, Processor, ProcessorSnapshot};
use crate::domain::{ExportJob, ImportJob, JobError, JobId, JobOutcome, JobRequest, RejectionError};
use crate::port::{ImportCache, ServiceHost};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Registry tunables
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Id given to the first accepted job
    pub first_job_id: JobId,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            first_job_id: FIRST_JOB_ID,
        }
    }
}

struct RegistryState {
    jobs: HashMap<JobId, Arc<Processor>>,
    reservations: ReservationTable,
    next_job_id: JobId,
    /// `None` once the worker was told to stop
    queue: Option<mpsc::UnboundedSender<Arc<Processor>>>,
    background_work: usize,
}

struct RegistryInner {
    state: Mutex<RegistryState>,
    context: JobContext,
    host: Option<Arc<dyn ServiceHost>>,
    cache: Option<Arc<dyn ImportCache>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RegistryInner {
    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        // job bodies never run under this lock, so a poisoned guard still
        // holds consistent state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the queue if nothing is left to do. True if this call did it.
    fn close_if_idle(state: &mut RegistryState) -> bool {
        if state.queue.is_some() && state.jobs.is_empty() && state.background_work == 0 {
            state.queue = None;
            true
        } else {
            false
        }
    }

    fn went_idle(&self) {
        info!("No jobs left, job worker shutting down");
        self.clear_cache();
        if let Some(host) = &self.host {
            host.on_idle();
        }
    }

    fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            match cache.clear() {
                Ok(removed) => debug!(removed, "Import cache cleared"),
                Err(e) => warn!("Failed to clear import cache: {}", e),
            }
        }
    }
}

impl CompletionSink for RegistryInner {
    fn notify_finished(&self, job_id: JobId, outcome: &JobOutcome) {
        let idle = {
            let mut state = self.lock_state();
            match state.jobs.remove(&job_id) {
                Some(processor) => {
                    if let Some(path) = processor.request().destination() {
                        state.reservations.release_if_owner(path, job_id);
                    }
                    debug!(job_id = %job_id, outcome = %outcome, "Job removed from registry");
                }
                None if state.queue.is_none() => {
                    debug!(job_id = %job_id, "Job finished after registry shutdown");
                }
                None => warn!(job_id = %job_id, "Finished job was not registered"),
            }
            RegistryInner::close_if_idle(&mut state)
        };

        if idle {
            self.went_idle();
        }
    }
}

/// Builder for [`JobRegistry`]
pub struct RegistryBuilder {
    context: JobContext,
    config: RegistryConfig,
    host: Option<Arc<dyn ServiceHost>>,
    cache: Option<Arc<dyn ImportCache>>,
}

impl RegistryBuilder {
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Signalled when the registry goes idle
    pub fn host(mut self, host: Arc<dyn ServiceHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Cleared on idle and on shutdown
    pub fn import_cache(mut self, cache: Arc<dyn ImportCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start(self) -> JobRegistry {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker::run(rx));

        let inner = RegistryInner {
            state: Mutex::new(RegistryState {
                jobs: HashMap::new(),
                reservations: ReservationTable::new(),
                next_job_id: self.config.first_job_id,
                queue: Some(tx),
                background_work: 0,
            }),
            context: self.context,
            host: self.host,
            cache: self.cache,
            worker: Mutex::new(Some(handle)),
        };

        info!(first_job_id = %self.config.first_job_id, "Job registry started");
        JobRegistry {
            inner: Arc::new(inner),
        }
    }
}

/// Job registry: submission, cancellation and lifecycle of the worker
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RegistryInner>,
}

impl JobRegistry {
    pub fn builder(context: JobContext) -> RegistryBuilder {
        RegistryBuilder {
            context,
            config: RegistryConfig::default(),
            host: None,
            cache: None,
        }
    }

    pub fn submit_import(&self, job: ImportJob) -> Result<JobId, RejectionError> {
        self.submit(JobRequest::Import(job), 0)
    }

    /// Submit in order; the first rejection stops the batch and is returned
    pub fn submit_imports(&self, jobs: Vec<ImportJob>) -> Result<Vec<JobId>, RejectionError> {
        let mut ids = Vec::with_capacity(jobs.len());
        for (sequence, job) in jobs.into_iter().enumerate() {
            ids.push(self.submit(JobRequest::Import(job), sequence)?);
        }
        Ok(ids)
    }

    /// Reserve the destination, then queue the export
    ///
    /// A destination already held by another job is rejected, never queued
    /// behind it.
    pub fn submit_export(&self, job: ExportJob) -> Result<JobId, RejectionError> {
        self.submit(JobRequest::Export(job), 0)
    }

    fn submit(&self, request: JobRequest, sequence: usize) -> Result<JobId, RejectionError> {
        let accepted = {
            let mut state = self.inner.lock_state();
            self.enqueue(&mut state, &request)
        };

        match accepted {
            Ok(processor) => {
                let job_id = processor.job_id();
                info!(
                    job_id = %job_id,
                    kind = %request.kind(),
                    label = %request.label(),
                    "Job queued"
                );
                // admits on drop, so a panicking listener cannot stall the worker
                let _admission = processor.admission();
                self.inner
                    .context
                    .listener
                    .on_queued(processor.request(), job_id, sequence);
                Ok(job_id)
            }
            Err(rejection) => {
                warn!(kind = %request.kind(), label = %request.label(), "Job rejected: {}", rejection);
                self.inner.context.listener.on_failed(
                    &request,
                    None,
                    &JobError::Rejected(rejection.clone()),
                );
                Err(rejection)
            }
        }
    }

    /// Record and queue under the lock. Nothing is mutated on rejection.
    fn enqueue(
        &self,
        state: &mut RegistryState,
        request: &JobRequest,
    ) -> Result<Arc<Processor>, RejectionError> {
        let queue = state.queue.clone().ok_or(RejectionError::Closed)?;
        let job_id = state.next_job_id;

        if let Some(path) = request.destination() {
            if !state.reservations.try_reserve(path, job_id) {
                return Err(RejectionError::DestinationInUse {
                    path: path.to_string(),
                    owner: state.reservations.owner_of(path).unwrap_or_default(),
                });
            }
        }

        let completion: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let processor = Arc::new(Processor::new(
            job_id,
            request.clone(),
            self.inner.context.clone(),
            completion,
        ));

        if queue.send(Arc::clone(&processor)).is_err() {
            if let Some(path) = request.destination() {
                state.reservations.release_if_owner(path, job_id);
            }
            return Err(RejectionError::Closed);
        }

        state.jobs.insert(job_id, Arc::clone(&processor));
        state.next_job_id += 1;
        Ok(processor)
    }

    /// Ask a job to stop. False for unknown, finished or already canceled jobs.
    ///
    /// An export's destination is released right away so a new export to the
    /// same path is not blocked while the canceled one winds down.
    pub fn request_cancel(&self, job_id: JobId) -> bool {
        let mut state = self.inner.lock_state();
        let Some(processor) = state.jobs.get(&job_id).cloned() else {
            warn!(job_id = %job_id, "Cancel requested for unknown job (already finished?)");
            return false;
        };

        let canceled = processor.cancel();
        if canceled {
            if let Some(path) = processor.request().destination() {
                state.reservations.release_if_owner(path, job_id);
            }
        }
        canceled
    }

    /// Keep the registry alive for work that is not a job
    pub fn begin_background_work(&self) -> Result<BackgroundWork, RejectionError> {
        let mut state = self.inner.lock_state();
        if state.queue.is_none() {
            return Err(RejectionError::Closed);
        }
        state.background_work += 1;
        Ok(BackgroundWork {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Propose an export path that is neither reserved nor present on disk
    pub fn available_destination(
        &self,
        naming: &ExportNaming,
        exists: impl Fn(&str) -> bool,
    ) -> Result<String, DestinationError> {
        let state = self.inner.lock_state();
        naming.find_available(|path| state.reservations.contains(path) || exists(path))
    }

    /// Cancel everything, drop all state and stop the worker
    pub fn shutdown(&self) {
        let processors: Vec<Arc<Processor>> = {
            let mut state = self.inner.lock_state();
            state.queue = None;
            state.reservations.clear();
            state.jobs.drain().map(|(_, processor)| processor).collect()
        };

        for processor in &processors {
            processor.cancel();
        }
        info!(canceled = processors.len(), "Job registry shut down");
        self.inner.clear_cache();
    }

    /// Wait for the worker to exit (after idle or shutdown)
    pub async fn join(&self) {
        let handle = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Job worker ended abnormally: {}", e);
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock_state().queue.is_none()
    }

    /// Id the next accepted job will get
    pub fn next_job_id(&self) -> JobId {
        self.inner.lock_state().next_job_id
    }

    pub fn active_jobs(&self) -> usize {
        self.inner.lock_state().jobs.len()
    }

    pub fn is_reserved(&self, path: &str) -> bool {
        self.inner.lock_state().reservations.contains(path)
    }

    pub fn snapshot(&self, job_id: JobId) -> Option<ProcessorSnapshot> {
        self.inner
            .lock_state()
            .jobs
            .get(&job_id)
            .map(|processor| processor.snapshot())
    }

    pub fn snapshots(&self) -> Vec<ProcessorSnapshot> {
        let mut snapshots: Vec<ProcessorSnapshot> = self
            .inner
            .lock_state()
            .jobs
            .values()
            .map(|processor| processor.snapshot())
            .collect();
        snapshots.sort_by_key(|s| s.job_id);
        snapshots
    }
}

/// Hold that keeps the registry from going idle; released on drop
pub struct BackgroundWork {
    inner: Arc<RegistryInner>,
}

impl Drop for BackgroundWork {
    fn drop(&mut self) {
        let idle = {
            let mut state = self.inner.lock_state();
            state.background_work = state.background_work.saturating_sub(1);
            RegistryInner::close_if_idle(&mut state)
        };
        if idle {
            self.inner.went_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ContactEntry, ExportFormat, FormatVersion, ImportSource, ResultRef, VersionHint,
    };
    use crate::port::codec::mocks::{Latch, ParseScript, ScriptedCodec};
    use crate::port::contact_store::mocks::InMemoryContactStore;
    use crate::port::host::mocks::{CountingCache, CountingHost};
    use crate::port::listener::mocks::{JobEvent, RecordingListener};
    use crate::port::streams::mocks::MemoryStreams;
    use crate::port::JobListener;

    struct Fixture {
        registry: JobRegistry,
        listener: Arc<RecordingListener>,
        streams: Arc<MemoryStreams>,
        host: Arc<CountingHost>,
        cache: Arc<CountingCache>,
    }

    fn start(codec: ScriptedCodec, store: InMemoryContactStore) -> Fixture {
        let listener = Arc::new(RecordingListener::new());
        let streams = Arc::new(MemoryStreams::new());
        let host = Arc::new(CountingHost::new());
        let cache = Arc::new(CountingCache::new());
        let registry = JobRegistry::builder(JobContext {
            codec: Arc::new(codec),
            store: Arc::new(store),
            streams: streams.clone(),
            listener: listener.clone(),
        })
        .host(host.clone())
        .import_cache(cache.clone())
        .start();

        Fixture {
            registry,
            listener,
            streams,
            host,
            cache,
        }
    }

    fn three_entries() -> ParseScript {
        ParseScript::Entries(vec![
            ContactEntry::new("Ada"),
            ContactEntry::new("Grace"),
            ContactEntry::new("Edsger"),
        ])
    }

    fn import_job() -> ImportJob {
        ImportJob::new(ImportSource::from_bytes("BEGIN:VCARD"), "contacts.vcf")
    }

    fn export_job(path: &str) -> ExportJob {
        ExportJob::new(path, ExportFormat::V21Generic)
    }

    #[tokio::test]
    async fn test_import_three_entries_scenario() {
        let f = start(
            ScriptedCodec::new().with_script(FormatVersion::V21, three_entries()),
            InMemoryContactStore::new(),
        );

        let id = f
            .registry
            .submit_import(import_job().with_expected_entries(3))
            .unwrap();
        let terminal = f.listener.wait_terminal(id).await;

        assert_eq!(terminal, JobEvent::Finished { job_id: id, result: None });
        let events = f.listener.events_for(id);
        assert_eq!(events[0], JobEvent::Queued { job_id: id, sequence: 0 });
        assert_eq!(f.listener.progress_count(id), 3);
        assert!(events.iter().all(|e| match e {
            JobEvent::Progress { total, .. } => *total == 3,
            _ => true,
        }));
    }

    #[tokio::test]
    async fn test_single_committed_entry_is_the_result() {
        let f = start(
            ScriptedCodec::new().with_script(
                FormatVersion::V30,
                ParseScript::Entries(vec![ContactEntry::new("Ada")]),
            ),
            InMemoryContactStore::new(),
        );

        let id = f.registry.submit_import(import_job()).unwrap();

        assert_eq!(
            f.listener.wait_terminal(id).await,
            JobEvent::Finished {
                job_id: id,
                result: Some(ResultRef::Entry(1))
            }
        );
    }

    #[tokio::test]
    async fn test_every_job_finishes_exactly_once_and_registry_empties() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new()
                .with_script(FormatVersion::V21, three_entries())
                .with_script(FormatVersion::V30, ParseScript::Panic("boom".into()))
                .with_hold(latch.clone()),
            InMemoryContactStore::with_entries(2),
        );

        let ok = f.registry.submit_import(import_job()).unwrap();
        let panics = f
            .registry
            .submit_import(import_job().with_version(VersionHint::V30))
            .unwrap();
        let missing = f
            .registry
            .submit_import(ImportJob::new(
                ImportSource::File("/missing.vcf".into()),
                "missing",
            ))
            .unwrap();
        let canceled = f.registry.submit_export(export_job("/tmp/a.vcf")).unwrap();
        assert!(f.registry.request_cancel(canceled));
        let exported = f.registry.submit_export(export_job("/tmp/a.vcf")).unwrap();

        latch.open();
        for id in [ok, panics, missing, canceled, exported] {
            f.listener.wait_terminal(id).await;
            assert_eq!(f.listener.terminal_events(id).len(), 1, "job {}", id);
        }

        assert_eq!(f.registry.active_jobs(), 0);
        assert!(!f.registry.is_reserved("/tmp/a.vcf"));
        assert!(matches!(
            f.listener.terminal_events(panics)[0],
            JobEvent::Failed { error: JobError::Internal(_), .. }
        ));
        assert_eq!(
            f.listener.terminal_events(canceled),
            vec![JobEvent::Canceled { job_id: canceled }]
        );
    }

    #[tokio::test]
    async fn test_same_destination_is_rejected_not_queued() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new().with_hold(latch.clone()),
            InMemoryContactStore::with_entries(2),
        );

        let first = f.registry.submit_export(export_job("/tmp/export.vcf")).unwrap();
        assert!(f.registry.is_reserved("/tmp/export.vcf"));

        let second = f.registry.submit_export(export_job("/tmp/export.vcf"));
        assert_eq!(
            second,
            Err(RejectionError::DestinationInUse {
                path: "/tmp/export.vcf".into(),
                owner: first
            })
        );
        assert_eq!(f.registry.active_jobs(), 1);
        assert!(f.listener.events().iter().any(|e| matches!(
            e,
            JobEvent::Failed {
                job_id: None,
                error: JobError::Rejected(RejectionError::DestinationInUse { .. })
            }
        )));

        latch.open();
        f.listener.wait_terminal(first).await;
        assert!(!f.registry.is_reserved("/tmp/export.vcf"));
        // the rejected submission did not consume an id
        assert_eq!(f.registry.next_job_id(), first + 1);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new()
                .with_script(FormatVersion::V21, three_entries())
                .with_hold(latch.clone()),
            InMemoryContactStore::new(),
        );

        let id = f.registry.submit_import(import_job()).unwrap();
        assert!(f.registry.request_cancel(id));
        assert!(!f.registry.request_cancel(id));
        latch.open();

        assert_eq!(
            f.listener.wait_terminal(id).await,
            JobEvent::Canceled { job_id: id }
        );
        assert!(!f.registry.request_cancel(id));
        assert!(!f.registry.request_cancel(999));
    }

    #[tokio::test]
    async fn test_empty_export_scenario() {
        let f = start(ScriptedCodec::new(), InMemoryContactStore::new());

        let id = f.registry.submit_export(export_job("/tmp/export.vcf")).unwrap();

        assert_eq!(
            f.listener.wait_terminal(id).await,
            JobEvent::Failed {
                job_id: Some(id),
                error: JobError::EmptyResult
            }
        );
        assert!(!f.registry.is_reserved("/tmp/export.vcf"));
        assert_eq!(f.registry.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_second_progress_scenario() {
        let f = start(ScriptedCodec::new(), InMemoryContactStore::with_entries(5));
        let registry = f.registry.clone();
        f.listener.on_progress_do(move |job_id, current| {
            if current == 2 {
                registry.request_cancel(job_id);
            }
        });

        let id = f.registry.submit_export(export_job("/tmp/export.vcf")).unwrap();

        assert_eq!(
            f.listener.wait_terminal(id).await,
            JobEvent::Canceled { job_id: id }
        );
        assert_eq!(f.listener.progress_count(id), 2);
        assert!(!f.registry.is_reserved("/tmp/export.vcf"));
        let partial = f.streams.contents("/tmp/export.vcf").unwrap();
        assert_eq!(partial.matches("BEGIN:MOCK").count(), 2);
    }

    #[tokio::test]
    async fn test_canceled_export_frees_path_immediately() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new().with_hold(latch.clone()),
            InMemoryContactStore::with_entries(1),
        );

        let first = f.registry.submit_export(export_job("/tmp/x.vcf")).unwrap();
        assert!(f.registry.request_cancel(first));
        assert!(!f.registry.is_reserved("/tmp/x.vcf"));

        let second = f.registry.submit_export(export_job("/tmp/x.vcf")).unwrap();

        // the canceled job stops before composing; the second one then waits
        // on the latch, so its claim is still live when the first one finishes
        assert_eq!(
            f.listener.wait_terminal(first).await,
            JobEvent::Canceled { job_id: first }
        );
        assert!(f.registry.is_reserved("/tmp/x.vcf"));
        assert!(f.registry.snapshot(second).is_some());

        latch.open();
        assert!(matches!(
            f.listener.wait_terminal(second).await,
            JobEvent::Finished { .. }
        ));
        assert!(!f.registry.is_reserved("/tmp/x.vcf"));
    }

    /// Panics on `on_queued`, records everything else
    struct QueuePanicListener(RecordingListener);

    impl JobListener for QueuePanicListener {
        fn on_queued(&self, _request: &JobRequest, job_id: JobId, _sequence: usize) {
            panic!("listener failed on job {}", job_id);
        }

        fn on_progress(
            &self,
            request: &JobRequest,
            job_id: JobId,
            entry: Option<&ContactEntry>,
            current: u64,
            total: u64,
        ) {
            self.0.on_progress(request, job_id, entry, current, total);
        }

        fn on_finished(&self, request: &JobRequest, job_id: JobId, result: Option<&ResultRef>) {
            self.0.on_finished(request, job_id, result);
        }

        fn on_failed(&self, request: &JobRequest, job_id: Option<JobId>, error: &JobError) {
            self.0.on_failed(request, job_id, error);
        }

        fn on_canceled(&self, request: &JobRequest, job_id: JobId) {
            self.0.on_canceled(request, job_id);
        }
    }

    #[tokio::test]
    async fn test_panicking_queue_listener_does_not_stall_worker() {
        let listener = Arc::new(QueuePanicListener(RecordingListener::new()));
        let registry = JobRegistry::builder(JobContext {
            codec: Arc::new(
                ScriptedCodec::new().with_script(FormatVersion::V21, three_entries()),
            ),
            store: Arc::new(InMemoryContactStore::new()),
            streams: Arc::new(MemoryStreams::new()),
            listener: listener.clone(),
        })
        .start();
        let _hold = registry.begin_background_work().unwrap();

        let submitted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            registry.submit_import(import_job())
        }));
        assert!(submitted.is_err());

        let job_id = registry.snapshots()[0].job_id;
        assert_eq!(
            listener.0.wait_terminal(job_id).await,
            JobEvent::Finished { job_id, result: None }
        );
        assert_eq!(registry.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new()
                .with_script(FormatVersion::V21, three_entries())
                .with_hold(latch.clone()),
            InMemoryContactStore::with_entries(2),
        );

        let a = f.registry.submit_import(import_job()).unwrap();
        let b = f.registry.submit_export(export_job("/tmp/b.vcf")).unwrap();
        let c = f.registry.submit_import(import_job()).unwrap();
        assert_eq!((b, c), (a + 1, a + 2));

        latch.open();
        f.listener.wait_terminal(c).await;

        let order: Vec<JobId> = f
            .listener
            .events()
            .iter()
            .filter(|e| e.is_terminal())
            .filter_map(JobEvent::job_id)
            .collect();
        assert_eq!(order, vec![a, b, c]);

        // no interleaving: all of a's events precede b's first progress
        let events = f.listener.events();
        let a_done = events
            .iter()
            .position(|e| e.is_terminal() && e.job_id() == Some(a))
            .unwrap();
        let b_first = events
            .iter()
            .position(|e| matches!(e, JobEvent::Progress { job_id, .. } if *job_id == b))
            .unwrap();
        assert!(a_done < b_first);
    }

    #[tokio::test]
    async fn test_idle_closes_queue_and_signals_host() {
        let f = start(
            ScriptedCodec::new().with_script(FormatVersion::V21, three_entries()),
            InMemoryContactStore::new(),
        );

        let id = f.registry.submit_import(import_job()).unwrap();
        f.listener.wait_terminal(id).await;

        assert!(f.registry.is_shut_down());
        assert_eq!(f.host.idle_calls(), 1);
        assert_eq!(f.cache.clears(), 1);

        assert_eq!(
            f.registry.submit_import(import_job()),
            Err(RejectionError::Closed)
        );
        assert!(matches!(
            f.listener.events().last(),
            Some(JobEvent::Failed {
                job_id: None,
                error: JobError::Rejected(RejectionError::Closed)
            })
        ));
        f.registry.join().await;
    }

    #[tokio::test]
    async fn test_background_work_defers_idle() {
        let f = start(
            ScriptedCodec::new().with_script(FormatVersion::V21, three_entries()),
            InMemoryContactStore::new(),
        );

        let hold = tokio_test::assert_ok!(f.registry.begin_background_work());
        let first = f.registry.submit_import(import_job()).unwrap();
        f.listener.wait_terminal(first).await;
        assert!(!f.registry.is_shut_down());

        let second = f.registry.submit_import(import_job()).unwrap();
        f.listener.wait_terminal(second).await;
        assert_eq!(f.host.idle_calls(), 0);

        drop(hold);
        assert!(f.registry.is_shut_down());
        assert_eq!(f.host.idle_calls(), 1);
        assert!(matches!(f.registry.begin_background_work(), Err(RejectionError::Closed)));
    }

    #[tokio::test]
    async fn test_batch_import_reports_sequence() {
        let f = start(
            ScriptedCodec::new().with_script(FormatVersion::V21, three_entries()),
            InMemoryContactStore::new(),
        );
        let _hold = f.registry.begin_background_work().unwrap();

        let ids = f
            .registry
            .submit_imports(vec![import_job(), import_job(), import_job()])
            .unwrap();
        for id in &ids {
            f.listener.wait_terminal(*id).await;
        }

        let sequences: Vec<usize> = f
            .listener
            .events()
            .into_iter()
            .filter_map(|e| match e {
                JobEvent::Queued { sequence, .. } => Some(sequence),
                _ => None,
            })
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued_jobs() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new()
                .with_script(FormatVersion::V21, three_entries())
                .with_hold(latch.clone()),
            InMemoryContactStore::with_entries(1),
        );

        let running = f.registry.submit_import(import_job()).unwrap();
        let queued = f.registry.submit_export(export_job("/tmp/q.vcf")).unwrap();

        f.registry.shutdown();
        assert_eq!(f.registry.active_jobs(), 0);
        assert!(!f.registry.is_reserved("/tmp/q.vcf"));
        assert_eq!(f.cache.clears(), 1);
        assert_eq!(f.registry.submit_import(import_job()), Err(RejectionError::Closed));

        latch.open();
        f.registry.join().await;
        assert_eq!(
            f.listener.terminal_events(running),
            vec![JobEvent::Canceled { job_id: running }]
        );
        assert_eq!(
            f.listener.terminal_events(queued),
            vec![JobEvent::Canceled { job_id: queued }]
        );
        assert_eq!(f.host.idle_calls(), 0);
    }

    #[tokio::test]
    async fn test_available_destination_skips_reserved_paths() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new().with_hold(latch.clone()),
            InMemoryContactStore::with_entries(1),
        );
        let naming = ExportNaming::in_directory("/exports");

        let path = f.registry.available_destination(&naming, |_| false).unwrap();
        assert_eq!(path, "/exports/00001.vcf");

        let id = f.registry.submit_export(export_job(&path)).unwrap();
        let next = f
            .registry
            .available_destination(&naming, |p| p == "/exports/00002.vcf")
            .unwrap();
        assert_eq!(next, "/exports/00003.vcf");

        latch.open();
        f.listener.wait_terminal(id).await;
    }

    #[tokio::test]
    async fn test_snapshots_list_registered_jobs() {
        let latch = Latch::new();
        let f = start(
            ScriptedCodec::new()
                .with_script(FormatVersion::V21, three_entries())
                .with_hold(latch.clone()),
            InMemoryContactStore::new(),
        );

        let a = f
            .registry
            .submit_import(import_job().with_expected_entries(3))
            .unwrap();
        let b = f.registry.submit_import(import_job()).unwrap();

        let snapshots = f.registry.snapshots();
        assert_eq!(
            snapshots.iter().map(|s| s.job_id).collect::<Vec<_>>(),
            vec![a, b]
        );
        assert_eq!(f.registry.snapshot(b).unwrap().total, 0);

        latch.open();
        f.listener.wait_terminal(b).await;
        assert!(f.registry.snapshot(a).is_none());
    }
}
