//! Daemon configuration from environment variables

use anyhow::{anyhow, Result};
use carddock_core::domain::ExportFormat;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "~/.carddock/contacts.db";
const DEFAULT_EXPORT_DIR: &str = "~/carddock-exports";
const DEFAULT_CACHE_DIR: &str = "~/.carddock/cache";
const DEFAULT_RPC_PORT: u16 = 9530;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub rpc_port: u16,
    pub export_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub export_format: ExportFormat,
    pub log_format: LogFormat,
    /// Also write logs to daily files here
    pub log_dir: Option<PathBuf>,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path_or = |key: &str, default: &str| expand(&get(key).unwrap_or_else(|| default.to_string()));

        let rpc_port = match get("CARDDOCK_RPC_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| anyhow!("Invalid CARDDOCK_RPC_PORT {:?}: {}", raw, e))?,
            None => DEFAULT_RPC_PORT,
        };
        let export_format = match get("CARDDOCK_EXPORT_FORMAT") {
            Some(raw) => raw.parse::<ExportFormat>().map_err(|e| anyhow!(e))?,
            None => ExportFormat::default(),
        };
        let log_format = match get("CARDDOCK_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            db_path: path_or("CARDDOCK_DB_PATH", DEFAULT_DB_PATH),
            rpc_port,
            export_dir: path_or("CARDDOCK_EXPORT_DIR", DEFAULT_EXPORT_DIR),
            cache_dir: path_or("CARDDOCK_CACHE_DIR", DEFAULT_CACHE_DIR),
            export_format,
            log_format,
            log_dir: get("CARDDOCK_LOG_DIR").map(|dir| expand(&dir)),
        })
    }

    /// sqlx connection url for the contact database
    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.db_path.display())
    }
}
