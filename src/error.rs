//! Error types for the cache service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache service.
///
/// Remote and snapshot failures never reach `CacheService::get`/`set` callers;
/// they surface only from background and administrative operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Value could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote tier operation failed
    #[error("Remote tier error: {0}")]
    Remote(String),

    /// Remote tier is not configured or marked failed
    #[error("Remote tier unavailable")]
    RemoteUnavailable,

    /// Snapshot storage failure
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Snapshots are not configured
    #[error("Snapshots are not configured")]
    SnapshotDisabled,

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Remote(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::RemoteUnavailable | CacheError::SnapshotDisabled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::Remote(_) | CacheError::Snapshot(_) => StatusCode::BAD_GATEWAY,
            CacheError::Io(_) | CacheError::Config(_) | CacheError::Internal(_) => {
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
/// Convenience Result type for the cache service.
pub type Result<T> = std::result::Result<T, CacheError>;
