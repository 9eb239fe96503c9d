//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::broadcast::RelayStatsSnapshot;
use crate::registry::RegistryStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: RegistryStats,
    pub relay: RelayStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connections: state.registry.len(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.registry.stats(),
        relay: state.broadcaster.stats(),
    })
}
