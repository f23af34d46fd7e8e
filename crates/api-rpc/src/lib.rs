//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 submission surface of the carddock daemon.

pub mod error;
pub mod handler;
pub mod host;
pub mod server;
pub mod status;
pub mod types;

pub use host::RegistryHost;
pub use server::{RpcServer, RpcServerConfig};
pub use status::StatusBoard;
