//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use carddock_core::domain::{ExportFormat, JobId, VersionHint};
use serde::{Deserialize, Serialize};

/// import.submit.v1 - Queue an import
///
/// Exactly one of `path` and `content` must be set.
#[derive(Debug, Deserialize)]
pub struct ImportSubmitRequest {
    #[serde(default)]
    pub path: Option<String>,
    /// Inline vCard text; copied into the import cache
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub version: VersionHint,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub expected_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSubmitResponse {
    pub job_id: JobId,
    pub source: String,
}

/// export.submit.v1 - Queue an export
///
/// Without a destination the next free name in the export directory is used.
#[derive(Debug, Deserialize)]
pub struct ExportSubmitRequest {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub format: Option<ExportFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSubmitResponse {
    pub job_id: JobId,
    pub destination: String,
}

/// export.destination.v1 - Propose an export path
#[derive(Debug, Deserialize)]
pub struct DestinationRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationResponse {
    pub destination: String,
}

/// job.cancel.v1 - Cancel a job
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub canceled: bool,
}

/// job.status.v1 - Status of one job, or of every known job
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub kind: String,
    pub label: String,
    /// QUEUED, RUNNING, SUCCEEDED, FAILED or CANCELED
    pub state: String,
    pub current: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub jobs: Vec<JobStatus>,
}
