//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::host::RegistryHost;
use crate::status::{merge_snapshot, StatusBoard};
use crate::types::{
    CancelRequest, CancelResponse, DestinationRequest, DestinationResponse, ExportSubmitRequest,
    ExportSubmitResponse, ImportSubmitRequest, ImportSubmitResponse, JobStatus, StatusRequest,
    StatusResponse,
};
use carddock_core::application::{ExportNaming, JobRegistry};
use carddock_core::domain::{
    AccountRef, ExportFormat, ExportJob, ImportJob, ImportSource, JobId, RejectionError,
};
use carddock_core::error::AppError;
use carddock_infra_system::ImportCacheDir;
use jsonrpsee::types::ErrorObjectOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Display name used for inline imports without one
const INLINE_IMPORT_NAME: &str = "inline import";

fn rejected(err: RejectionError) -> ErrorObjectOwned {
    to_rpc_error(AppError::Rejected(err))
}

fn validation(msg: impl Into<String>) -> ErrorObjectOwned {
    to_rpc_error(AppError::Validation(msg.into()))
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

fn on_disk(path: &str) -> bool {
    Path::new(path).exists()
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    host: RegistryHost,
    board: Arc<StatusBoard>,
    cache: Arc<ImportCacheDir>,
    naming: ExportNaming,
    default_format: ExportFormat,
}

impl RpcHandler {
    pub fn new(
        host: RegistryHost,
        board: Arc<StatusBoard>,
        cache: Arc<ImportCacheDir>,
        naming: ExportNaming,
        default_format: ExportFormat,
    ) -> Self {
        Self {
            host,
            board,
            cache,
            naming,
            default_format,
        }
    }

    /// import.submit.v1
    pub async fn import_submit(
        &self,
        params: ImportSubmitRequest,
    ) -> Result<ImportSubmitResponse, ErrorObjectOwned> {
        let account = match (params.account_name, params.account_type) {
            (Some(name), Some(account_type)) => Some(AccountRef { name, account_type }),
            (None, None) => None,
            _ => return Err(validation("account_name and account_type must be given together")),
        };
        let finish = |source: ImportSource, fallback_name: String| {
            let mut job = ImportJob::new(source, params.display_name.clone().unwrap_or(fallback_name))
                .with_version(params.version)
                .with_expected_entries(params.expected_entries);
            if let Some(account) = account.clone() {
                job = job.with_account(account);
            }
            if let Some(charset) = params.charset.clone() {
                job = job.with_charset(charset);
            }
            job
        };

        match (params.path, params.content) {
            (Some(path), None) => {
                let path = PathBuf::from(expand(&path));
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let job = finish(ImportSource::File(path.clone()), name);
                let job_id = self
                    .host
                    .with_registry(|registry| registry.submit_import(job.clone()))
                    .map_err(rejected)?;
                Ok(ImportSubmitResponse {
                    job_id,
                    source: path.display().to_string(),
                })
            }
            (None, Some(content)) => {
                // keep the registry from going idle (and clearing the cache)
                // between caching the payload and queueing the job
                let (registry, _hold) = self
                    .host
                    .with_registry(|registry| {
                        registry
                            .begin_background_work()
                            .map(|hold| (registry.clone(), hold))
                    })
                    .map_err(rejected)?;
                let cached = self
                    .cache
                    .store(content.as_bytes())
                    .map_err(|e| to_rpc_error(e.into()))?;
                debug!(path = %cached.display(), "Inline import cached");

                let job = finish(
                    ImportSource::File(cached.clone()),
                    INLINE_IMPORT_NAME.to_string(),
                );
                let job_id = registry.submit_import(job).map_err(rejected)?;
                Ok(ImportSubmitResponse {
                    job_id,
                    source: cached.display().to_string(),
                })
            }
            _ => Err(validation("exactly one of path and content is required")),
        }
    }

    /// export.submit.v1
    pub async fn export_submit(
        &self,
        params: ExportSubmitRequest,
    ) -> Result<ExportSubmitResponse, ErrorObjectOwned> {
        let format = params.format.unwrap_or(self.default_format);

        let (job_id, destination) = match params.destination {
            Some(destination) => {
                let destination = expand(&destination);
                let job_id = self
                    .host
                    .with_registry(|registry| {
                        registry.submit_export(ExportJob::new(destination.clone(), format))
                    })
                    .map_err(rejected)?;
                (job_id, destination)
            }
            None => {
                let registry = self.host.registry().map_err(rejected)?;
                match self.submit_auto_export(&registry, format) {
                    Err(AppError::Rejected(RejectionError::Closed)) => {
                        let registry = self.host.registry().map_err(rejected)?;
                        self.submit_auto_export(&registry, format)
                    }
                    other => other,
                }
                .map_err(to_rpc_error)?
            }
        };

        Ok(ExportSubmitResponse {
            job_id,
            destination,
        })
    }

    fn submit_auto_export(
        &self,
        registry: &JobRegistry,
        format: ExportFormat,
    ) -> Result<(JobId, String), AppError> {
        let destination = registry.available_destination(&self.naming, on_disk)?;
        let job_id = registry.submit_export(ExportJob::new(destination.clone(), format))?;
        Ok((job_id, destination))
    }

    /// export.destination.v1
    pub async fn export_destination(
        &self,
        _params: DestinationRequest,
    ) -> Result<DestinationResponse, ErrorObjectOwned> {
        // no live registry means no reservations to consult
        let destination = match self.host.current() {
            Some(registry) => registry.available_destination(&self.naming, on_disk),
            None => self.naming.find_available(on_disk),
        }
        .map_err(|e| to_rpc_error(e.into()))?;

        Ok(DestinationResponse { destination })
    }

    /// job.cancel.v1
    pub async fn cancel(&self, params: CancelRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        let canceled = self
            .host
            .current()
            .map(|registry| registry.request_cancel(params.job_id))
            .unwrap_or(false);

        if !canceled && self.board.get(params.job_id).is_none() {
            return Err(to_rpc_error(AppError::NotFound(format!(
                "Job {} not found",
                params.job_id
            ))));
        }

        Ok(CancelResponse {
            job_id: params.job_id,
            canceled,
        })
    }

    /// job.status.v1
    pub async fn status(&self, params: StatusRequest) -> Result<StatusResponse, ErrorObjectOwned> {
        let registry = self.host.current();
        let live = |mut status: JobStatus| {
            if let Some(snapshot) = registry.as_ref().and_then(|r| r.snapshot(status.job_id)) {
                merge_snapshot(&mut status, &snapshot);
            }
            status
        };

        let jobs = match params.job_id {
            Some(job_id) => {
                let status = self.board.get(job_id).ok_or_else(|| {
                    to_rpc_error(AppError::NotFound(format!("Job {} not found", job_id)))
                })?;
                vec![live(status)]
            }
            None => self.board.all().into_iter().map(live).collect(),
        };

        Ok(StatusResponse { jobs })
    }
}
