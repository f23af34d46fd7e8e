//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use carddock_core::application::DestinationError;
use carddock_core::domain::RejectionError;
use carddock_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const SYSTEM_ERROR: i32 = 5002;
    pub const UNAVAILABLE: i32 = 5003;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let message = err.to_string();
    let code = match err {
        AppError::Rejected(RejectionError::Closed) => code::UNAVAILABLE,
        AppError::Rejected(RejectionError::DestinationInUse { .. }) => code::CONFLICT,
        AppError::Destination(DestinationError::TooManyFiles { .. }) => code::CONFLICT,
        AppError::Destination(DestinationError::TooLongFileName(_)) => code::VALIDATION_ERROR,
        AppError::Validation(_) | AppError::Serialization(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Store(_) | AppError::Database(_) => code::DB_ERROR,
        AppError::Io(_) => code::SYSTEM_ERROR,
        AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, message, None::<()>)
}
