//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    SnapshotResponse,
};
use crate::service::{CacheService, StatsReport};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Two-tier cache facade
    pub cache: Arc<CacheService>,
}

impl AppState {
    /// Creates a new AppState around a cache service.
    pub fn new(cache: CacheService) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn from_shared(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set_value(&req.key, req.value, req.ttl).await;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get_value(&key)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Deleting a missing key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.cache.delete(&key).await;
    Json(DeleteResponse::new(key))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear().await;
    Json(ClearResponse::new())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsReport> {
    Json(state.cache.stats().await)
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.remote_available()))
}

/// Handler for POST /snapshot
///
/// Takes a snapshot of the remote tier now.
pub async fn snapshot_handler(State(state): State<AppState>) -> Result<Json<SnapshotResponse>> {
    let keys = state.cache.snapshot_now().await?;
    Ok(Json(SnapshotResponse::new(keys)))
}
