// src/api.rs
//! # HTTP Surface
//! Thin Axum layer over [`EnrichmentEngine`]. Handlers never fail the
//! request for source-level problems; a degraded run still returns 200
//! with whatever signals survived.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::cache::CacheStats;
use crate::engine::EnrichmentEngine;
use crate::signal::{EnrichmentRequest, EnrichmentResponse};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EnrichmentEngine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/enrich", post(enrich))
        .route("/sources", get(list_sources))
        .route("/admin/clear-cache", post(admin_clear_cache))
        .route("/admin/cache-stats", get(admin_cache_stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
    sources: usize,
    max_workers: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    Json(HealthResp {
        status: "ok",
        sources: state.engine.registry().clients().len(),
        max_workers: state.engine.max_workers(),
    })
}

async fn enrich(
    State(state): State<AppState>,
    Json(request): Json<EnrichmentRequest>,
) -> Json<EnrichmentResponse> {
    Json(state.engine.enrich(&request).await)
}

#[derive(Serialize)]
struct SourceInfo {
    name: String,
    signal_type: String,
    reliability_score: f32,
    requests_per_minute: u32,
    cache_ttl_hours: u64,
    respects_robots: bool,
    allowed_domains: Vec<String>,
}

async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    let out = state
        .engine
        .registry()
        .descriptors()
        .into_iter()
        .map(|d| SourceInfo {
            name: d.name.clone(),
            signal_type: d.signal_type.as_str().to_string(),
            reliability_score: d.reliability_score,
            requests_per_minute: d.requests_per_minute,
            cache_ttl_hours: d.cache_ttl_hours,
            respects_robots: d.respects_robots,
            allowed_domains: d.allowed_domains.clone(),
        })
        .collect();
    Json(out)
}

#[derive(Serialize)]
struct ClearCacheResp {
    cleared: usize,
}

async fn admin_clear_cache(State(state): State<AppState>) -> Json<ClearCacheResp> {
    Json(ClearCacheResp {
        cleared: state.engine.clear_cache(),
    })
}

async fn admin_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.engine.cache_stats())
}
