// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Job outcomes never travel through this type: a finished job reports a
/// [`crate::domain::JobOutcome`] to its listener. `AppError` covers the
/// surfaces around the runner (submission, adapters, configuration).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Submission rejected: {0}")]
    Rejected(#[from] crate::domain::RejectionError),

    #[error("Destination error: {0}")]
    Destination(#[from] crate::application::destination::DestinationError),

    #[error("Store error: {0}")]
    Store(#[from] crate::port::StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)
