//! Error types for the write-back cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache, its backing stores and the server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not present in the cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Cache constructed with a capacity below one
    #[error("Invalid capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Durable store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidCapacity(_) | CacheError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_) | CacheError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
