//! carddock daemon - Main Entry Point
//! JSON-RPC server in front of the contact import/export job runner

mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Import workspace crates
use carddock_api_rpc::{RegistryHost, RpcServer, RpcServerConfig, StatusBoard};
use carddock_core::application::{ExportNaming, JobContext, RegistryConfig};
use carddock_infra_sqlite::{create_pool, run_migrations, SqliteContactStore};
use carddock_infra_system::{FsStreamProvider, ImportCacheDir, VCardCodec};
use config::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration and initialize logging
    let config = DaemonConfig::from_env()?;
    let _log_guard = logging::init(&config);

    info!("carddock daemon v{} starting...", VERSION);

    // 2. Initialize database
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(db_path = %config.db_path.display(), "Initializing database...");
    let pool = create_pool(&config.database_url())
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    std::fs::create_dir_all(&config.export_dir)
        .with_context(|| format!("Failed to create {}", config.export_dir.display()))?;

    // 3. Setup dependencies (DI wiring)
    let store = SqliteContactStore::from_current(pool.clone())
        .map_err(|e| anyhow::anyhow!("Contact store setup failed: {}", e))?;
    let board = Arc::new(StatusBoard::new());
    let cache = Arc::new(ImportCacheDir::new(&config.cache_dir));
    let context = JobContext {
        codec: Arc::new(VCardCodec::new()),
        store: Arc::new(store),
        streams: Arc::new(FsStreamProvider::new()),
        listener: board.clone(),
    };
    let host = RegistryHost::new(context, cache.clone(), RegistryConfig::default().first_job_id);

    // 4. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: config.rpc_port,
        export_naming: ExportNaming::in_directory(&config.export_dir),
        default_format: config.export_format,
        ..Default::default()
    };
    let rpc_handle = RpcServer::new(rpc_config, host.clone(), board, cache)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown: stop accepting calls, cancel jobs, wait for the worker
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, host.shutdown())
        .await
        .is_err()
    {
        warn!("Job worker did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
