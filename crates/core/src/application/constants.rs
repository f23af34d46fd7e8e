// Runner constants (no magic values)
use crate::domain::JobId;

/// First job id handed out by a fresh registry lineage
pub const FIRST_JOB_ID: JobId = 1;

/// Default extension of exported files
pub const DEFAULT_EXPORT_EXTENSION: &str = "vcf";

/// Lowest index tried when picking an export file name
pub const DEFAULT_EXPORT_MIN_INDEX: u32 = 1;

/// Highest index tried when picking an export file name (also sets the zero padding)
pub const DEFAULT_EXPORT_MAX_INDEX: u32 = 99999;

/// 8.3 short-name limits, applied when long export names are disallowed
pub const SHORT_NAME_MAX_BODY: usize = 8;
pub const SHORT_NAME_MAX_EXTENSION: usize = 3;
