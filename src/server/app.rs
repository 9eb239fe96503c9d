use axum::{routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::api::api_routes;
use crate::websocket::ws_handler;

use super::AppState;

pub fn create_app(state: AppState) -> Router {
    let ws_path = state.settings.websocket.path.clone();
    let max_request_bytes = state.settings.websocket.max_request_bytes;

    Router::new()
        // WebSocket endpoint at the configured upgrade path
        .route(&ws_path, get(ws_handler))
        // Merge operational routes
        .merge(api_routes())
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_request_bytes))
        // Add state
        .with_state(state)
}
