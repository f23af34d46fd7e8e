//! Registry Host
//!
//! Owns the current [`JobRegistry`]. A registry shuts its worker down once it
//! goes idle; the host then drops it and builds a fresh one on the next
//! request. Job ids keep increasing across registries.

use carddock_core::application::{JobContext, JobRegistry, RegistryConfig};
use carddock_core::domain::{JobId, RejectionError};
use carddock_core::port::{ImportCache, ServiceHost};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

struct Slot {
    registry: Option<JobRegistry>,
    next_job_id: JobId,
    closed: bool,
}

struct HostState {
    slot: Mutex<Slot>,
    context: JobContext,
    cache: Arc<dyn ImportCache>,
}

impl HostState {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_cache(&self) {
        match self.cache.clear() {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Import cache cleared"),
            Err(e) => warn!("Failed to clear import cache: {}", e),
        }
    }
}

/// Idle signal handed to each registry
struct IdleSignal {
    host: Weak<HostState>,
}

impl ServiceHost for IdleSignal {
    fn on_idle(&self) {
        let Some(host) = self.host.upgrade() else {
            return;
        };

        let mut slot = host.lock();
        // a registry built after this one went idle is live; leave it and its
        // cached payloads alone
        let idle = slot
            .registry
            .as_ref()
            .map(JobRegistry::is_shut_down)
            .unwrap_or(false);
        if !idle {
            return;
        }
        if let Some(registry) = slot.registry.take() {
            slot.next_job_id = slot.next_job_id.max(registry.next_job_id());
        }
        host.clear_cache();
        info!(next_job_id = %slot.next_job_id, "Registry idle, released");
    }
}

#[derive(Clone)]
pub struct RegistryHost {
    state: Arc<HostState>,
}

impl RegistryHost {
    pub fn new(context: JobContext, cache: Arc<dyn ImportCache>, first_job_id: JobId) -> Self {
        Self {
            state: Arc::new(HostState {
                slot: Mutex::new(Slot {
                    registry: None,
                    next_job_id: first_job_id,
                    closed: false,
                }),
                context,
                cache,
            }),
        }
    }

    /// The live registry, built on demand. Must be called inside a tokio runtime.
    pub fn registry(&self) -> Result<JobRegistry, RejectionError> {
        let mut slot = self.state.lock();
        if slot.closed {
            return Err(RejectionError::Closed);
        }

        if let Some(registry) = slot.registry.as_ref() {
            if !registry.is_shut_down() {
                return Ok(registry.clone());
            }
        }
        if let Some(previous) = slot.registry.take() {
            slot.next_job_id = slot.next_job_id.max(previous.next_job_id());
        }

        let registry = JobRegistry::builder(self.state.context.clone())
            .config(RegistryConfig {
                first_job_id: slot.next_job_id,
            })
            .host(Arc::new(IdleSignal {
                host: Arc::downgrade(&self.state),
            }))
            .start();
        slot.registry = Some(registry.clone());
        Ok(registry)
    }

    /// The live registry without building one
    pub fn current(&self) -> Option<JobRegistry> {
        self.state
            .lock()
            .registry
            .as_ref()
            .filter(|registry| !registry.is_shut_down())
            .cloned()
    }

    /// Run `submit` against the live registry, retrying once on a registry
    /// that went idle between lookup and submission
    pub fn with_registry<T>(
        &self,
        mut submit: impl FnMut(&JobRegistry) -> Result<T, RejectionError>,
    ) -> Result<T, RejectionError> {
        let registry = self.registry()?;
        match submit(&registry) {
            Err(RejectionError::Closed) => {
                debug!("Registry closed during submission, retrying on a fresh one");
                submit(&self.registry()?)
            }
            other => other,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Shut the live registry down, wait for its worker and refuse new work
    pub async fn shutdown(&self) {
        let registry = {
            let mut slot = self.state.lock();
            slot.closed = true;
            slot.registry.take()
        };
        if let Some(registry) = registry {
            registry.shutdown();
            registry.join().await;
        }
        self.state.clear_cache();
        info!("Registry host shut down");
    }
}
