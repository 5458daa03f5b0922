//! Route table for the dashboard API.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Build the dashboard router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics_text))
        .route("/api/v1/status", get(handlers::status))
        .route("/api/v1/positions", get(handlers::positions))
        .route("/api/v1/tasks", get(handlers::tasks))
        .route("/api/v1/performance", get(handlers::performance))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
