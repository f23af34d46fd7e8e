//! JSON-RPC Server
//!
//! Serves the job submission methods over TCP on localhost.

use crate::handler::RpcHandler;
use crate::host::RegistryHost;
use crate::status::StatusBoard;
use crate::types::{
    CancelRequest, DestinationRequest, ExportSubmitRequest, ImportSubmitRequest, StatusRequest,
};
use carddock_core::application::ExportNaming;
use carddock_core::domain::ExportFormat;
use carddock_infra_system::ImportCacheDir;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9530;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
    /// Naming rule for exports submitted without a destination
    pub export_naming: ExportNaming,
    pub default_format: ExportFormat,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            export_naming: ExportNaming::default(),
            default_format: ExportFormat::default(),
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        host: RegistryHost,
        board: Arc<StatusBoard>,
        cache: Arc<ImportCacheDir>,
    ) -> Self {
        let handler = RpcHandler::new(
            host,
            board,
            cache,
            config.export_naming.clone(),
            config.default_format,
        );
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Security: Only binds to the configured host (127.0.0.1 by default)
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("import.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ImportSubmitRequest = params.parse()?;
                    handler.import_submit(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("export.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ExportSubmitRequest = params.parse()?;
                    handler.export_submit(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("export.destination.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DestinationRequest = params.parse()?;
                    handler.export_destination(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CancelRequest = params.parse()?;
                    handler.cancel(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("job.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatusRequest = params.parse()?;
                    handler.status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok(handle)
    }
}
