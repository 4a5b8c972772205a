//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::storage::StorageError;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Only the variants a caller must never miss are returned from cache
/// operations; storage failures on single-key calls degrade to `false`/`None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Logical key is empty or otherwise unusable
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Reserved memcache operation with no implementation
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// Value could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// Storage failure surfaced to the caller
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) | CacheError::InvalidRequest(_) | CacheError::Codec(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            CacheError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
