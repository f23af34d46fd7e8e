// Job Domain Model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Job ID (monotonically increasing per registry lineage)
pub type JobId = u64;

/// Which processor body a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    Import,
    Export,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Import => write!(f, "IMPORT"),
            JobKind::Export => write!(f, "EXPORT"),
        }
    }
}

/// Interchange format version understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatVersion {
    #[serde(rename = "2.1")]
    V21,
    #[serde(rename = "3.0")]
    V30,
}

impl FormatVersion {
    /// Value of the `VERSION` property for this format
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVersion::V21 => "2.1",
            FormatVersion::V30 => "3.0",
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version estimate attached to an import request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionHint {
    #[serde(rename = "2.1")]
    V21,
    #[serde(rename = "3.0")]
    V30,
    #[default]
    #[serde(rename = "auto", alias = "auto_detect")]
    AutoDetect,
}

impl VersionHint {
    /// Versions to try, in order.
    ///
    /// Auto-detection always tries 2.1 first: its grammar is the looser one.
    pub fn candidates(&self) -> &'static [FormatVersion] {
        match self {
            VersionHint::V21 => &[FormatVersion::V21],
            VersionHint::V30 => &[FormatVersion::V30],
            VersionHint::AutoDetect => &[FormatVersion::V21, FormatVersion::V30],
        }
    }
}

impl std::str::FromStr for VersionHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "2.1" | "v21" => Ok(VersionHint::V21),
            "3.0" | "v30" => Ok(VersionHint::V30),
            "auto" | "auto_detect" => Ok(VersionHint::AutoDetect),
            other => Err(format!("unknown format version: {}", other)),
        }
    }
}

/// Output flavour for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    V21Generic,
    V30Generic,
}

impl ExportFormat {
    pub fn version(&self) -> FormatVersion {
        match self {
            ExportFormat::V21Generic => FormatVersion::V21,
            ExportFormat::V30Generic => FormatVersion::V30,
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v21" | "v21_generic" | "2.1" => Ok(ExportFormat::V21Generic),
            "v30" | "v30_generic" | "3.0" => Ok(ExportFormat::V30Generic),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

/// Account the imported entries are attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub name: String,
    pub account_type: String,
}

/// Where import bytes come from
///
/// Sources must be re-openable: every candidate version gets a fresh stream.
#[derive(Debug, Clone)]
pub enum ImportSource {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

impl ImportSource {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        ImportSource::Bytes(Arc::from(data.into()))
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            ImportSource::Bytes(data) => format!("<{} bytes>", data.len()),
            ImportSource::File(path) => path.display().to_string(),
        }
    }
}

/// One import request
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub source: ImportSource,
    pub target_account: Option<AccountRef>,
    pub display_name: String,
    pub version_hint: VersionHint,
    pub estimated_charset: Option<String>,
    pub expected_entry_count: u64,
}

impl ImportJob {
    pub fn new(source: ImportSource, display_name: impl Into<String>) -> Self {
        Self {
            source,
            target_account: None,
            display_name: display_name.into(),
            version_hint: VersionHint::AutoDetect,
            estimated_charset: None,
            expected_entry_count: 0,
        }
    }

    pub fn with_version(mut self, hint: VersionHint) -> Self {
        self.version_hint = hint;
        self
    }

    pub fn with_expected_entries(mut self, count: u64) -> Self {
        self.expected_entry_count = count;
        self
    }

    pub fn with_account(mut self, account: AccountRef) -> Self {
        self.target_account = Some(account);
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.estimated_charset = Some(charset.into());
        self
    }
}

/// One export request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub destination: String,
    pub format: ExportFormat,
}

impl ExportJob {
    pub fn new(destination: impl Into<String>, format: ExportFormat) -> Self {
        Self {
            destination: destination.into(),
            format,
        }
    }
}

/// A submitted request as listeners see it
#[derive(Debug, Clone)]
pub enum JobRequest {
    Import(ImportJob),
    Export(ExportJob),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Import(_) => JobKind::Import,
            JobRequest::Export(_) => JobKind::Export,
        }
    }

    /// Human readable label (import display name or export destination)
    pub fn label(&self) -> &str {
        match self {
            JobRequest::Import(job) => &job.display_name,
            JobRequest::Export(job) => &job.destination,
        }
    }

    /// Destination path reserved by this request, if any
    pub fn destination(&self) -> Option<&str> {
        match self {
            JobRequest::Import(_) => None,
            JobRequest::Export(job) => Some(&job.destination),
        }
    }
}
