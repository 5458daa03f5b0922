//! Read-only dashboard API.
//!
//! Serves health/readiness probes, Prometheus metrics and JSON snapshots of
//! positions, journal entries and per-category performance. Strictly a
//! consumer: nothing here writes to the stores.

pub mod handlers;
pub mod routes;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use time::OffsetDateTime;
use tracing::info;

use crate::error::Result;
use crate::storage::{PerformanceStore, PositionRepository, TaskJournal};
use crate::utils::ShutdownListener;

pub use routes::router;

/// Shared read-only state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Position reads.
    pub repository: Arc<dyn PositionRepository>,
    /// Journal reads.
    pub journal: Arc<dyn TaskJournal>,
    /// Performance row reads.
    pub performance: Arc<dyn PerformanceStore>,
    /// Process start time, for uptime reporting.
    pub started_at: OffsetDateTime,
    /// Flips true once the coordinator has resumed.
    pub ready: Arc<AtomicBool>,
    /// Prometheus render handle, absent in tests.
    pub metrics: Option<PrometheusHandle>,
}

/// Serve the API until shutdown.
pub async fn serve(state: AppState, port: u16, mut shutdown: ShutdownListener) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Dashboard API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;
    Ok(())
}
