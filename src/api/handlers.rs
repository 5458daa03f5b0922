//! Request handlers for the dashboard API.

use std::sync::atomic::Ordering;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::error;

use crate::error::PersistenceError;
use crate::performance::CategoryPerformance;
use crate::position::Position;
use crate::storage::{TaskAction, TaskLogEntry};

use super::AppState;

const DEFAULT_TASK_LIMIT: usize = 50;

fn internal(err: PersistenceError) -> StatusCode {
    error!(error = %err, "Dashboard read failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness probe: 503 until the coordinator has resumed.
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    if state.ready.load(Ordering::Acquire) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Prometheus exposition text.
pub async fn metrics_text(State(state): State<AppState>) -> String {
    state.metrics.as_ref().map(|h| h.render()).unwrap_or_default()
}

/// Top-level agent status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Seconds since process start.
    pub uptime_secs: i64,
    /// Non-terminal positions currently tracked.
    pub open_positions: usize,
    /// Opportunities detected across all categories.
    pub opportunities_found: u64,
    /// Positions resolved across all categories.
    pub resolved_count: u64,
    /// Journaled coordinator recoveries since the journal began.
    pub recoveries: usize,
}

/// GET /api/v1/status
pub async fn status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let open = state
        .repository
        .open_positions()
        .await
        .map_err(internal)?
        .len();
    let rows = state.performance.all().await.map_err(internal)?;
    let recoveries = state
        .journal
        .replay_since(None)
        .await
        .map_err(internal)?
        .iter()
        .filter(|e| e.action == TaskAction::Recover)
        .count();

    Ok(Json(StatusResponse {
        uptime_secs: (OffsetDateTime::now_utc() - state.started_at).whole_seconds(),
        open_positions: open,
        opportunities_found: rows.iter().map(|r| r.opportunities_found).sum(),
        resolved_count: rows.iter().map(|r| r.resolved_count).sum(),
        recoveries,
    }))
}

/// GET /api/v1/positions — all open positions.
pub async fn positions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Position>>, StatusCode> {
    let open = state.repository.open_positions().await.map_err(internal)?;
    Ok(Json(open))
}

/// Query for task listing.
#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    /// Maximum entries to return, newest first.
    pub limit: Option<usize>,
}

/// GET /api/v1/tasks — recent journal entries.
pub async fn tasks(
    State(state): State<AppState>,
    Query(query): Query<TasksQuery>,
) -> Result<Json<Vec<TaskLogEntry>>, StatusCode> {
    let entries = state
        .journal
        .recent(query.limit.unwrap_or(DEFAULT_TASK_LIMIT))
        .await
        .map_err(internal)?;
    Ok(Json(entries))
}

/// GET /api/v1/performance — per-category rows.
pub async fn performance(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryPerformance>>, StatusCode> {
    let rows = state.performance.all().await.map_err(internal)?;
    Ok(Json(rows))
}
