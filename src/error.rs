//! Error types for the page cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the page cache.
///
/// The engine absorbs storage errors itself; only the admin surface ever
/// turns one of these into a response.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache root missing or not writable
    #[error("Cache storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Writing one artifact failed
    #[error("Failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Empty or unparseable URL given to an invalidation call
    #[error("Invalid invalidation target: {0}")]
    InvalidInvalidationTarget(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or wrong admin credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other file-system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failed to complete
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidInvalidationTarget(_) | CacheError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Unauthorized => StatusCode::UNAUTHORIZED,
            CacheError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::WriteFailure { .. } | CacheError::Io(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the page cache.
pub type Result<T> = std::result::Result<T, CacheError>;
