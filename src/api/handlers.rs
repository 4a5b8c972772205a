//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, NamespaceQuery, SetRequest, SetResponse,
    SweepResponse,
};
use crate::storage::{DocumentStore, MemoryDocumentStore};
use crate::tasks::Sweeper;

/// Application state shared across all handlers.
///
/// The cache and the sweeper share one document store. Neither needs a lock:
/// the store serializes its own access.
#[derive(Clone)]
pub struct AppState {
    /// Cache surface
    pub cache: CacheStore,
    /// Expired-entry sweeper, also driven by the background task
    pub sweeper: Arc<Sweeper>,
    /// Time budget for a sweep triggered over HTTP
    pub sweep_deadline: Duration,
}

impl AppState {
    /// Creates a new AppState over the given document store.
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            cache: CacheStore::with_settings(Arc::clone(&store), config.cache_settings()),
            sweeper: Arc::new(Sweeper::with_batch_size(store, config.sweep_batch_size)),
            sweep_deadline: Duration::from_secs(config.sweep_deadline),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Backs the cache with an in-process document store sized to the
    /// configured batch limit.
    pub fn from_config(config: &Config) -> Self {
        let store = MemoryDocumentStore::with_batch_limit(config.batch_write_limit);
        Self::new(Arc::new(store), config)
    }
}

/// Handler for PUT /set
///
/// Stores a value unconditionally with optional TTL and namespace.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let stored = state
        .cache
        .set(&req.key, req.cache_value(), req.ttl_seconds(), req.namespace.as_deref())
        .await?;

    Ok(Json(SetResponse::new(req.key, stored)))
}

/// Handler for POST /add
///
/// Stores a value only if the key holds no live entry.
pub async fn add_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let stored = state
        .cache
        .add(&req.key, req.cache_value(), req.ttl_seconds(), req.namespace.as_deref())
        .await?;

    Ok(Json(SetResponse::new(req.key, stored)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value; misses and expired entries are 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key, query.namespace.as_deref()).await? {
        Some(value) => Ok(Json(GetResponse::new(key, &value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Deletes a key. Deleting a missing key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<NamespaceQuery>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.cache.delete(&key, query.namespace.as_deref()).await?;

    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for GET /vacuum
///
/// Runs one sweep within the configured deadline. Meant to be hit by an
/// external scheduler.
pub async fn vacuum_handler(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let report = state.sweeper.sweep_with_deadline(state.sweep_deadline).await?;

    Ok(Json(SweepResponse::from(report)))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
