//! Prometheus metrics for the coordination loop.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::market::Venue;
use crate::position::PositionState;

/// Opportunities detected across all categories.
pub const OPPORTUNITIES_DETECTED: &str = "arb_opportunities_detected_total";
/// Positions created in `watching`.
pub const POSITIONS_CREATED: &str = "arb_positions_created_total";
/// Positions resolved into a terminal state, labeled by state.
pub const POSITIONS_RESOLVED: &str = "arb_positions_resolved_total";
/// Individual fetch attempts that failed and will be retried.
pub const FETCH_RETRIES: &str = "arb_fetch_retries_total";
/// Fetches that exhausted all retry attempts.
pub const FETCH_FAILURES: &str = "arb_fetch_failures_total";
/// Quotes discarded by validation.
pub const QUOTES_REJECTED: &str = "arb_quotes_rejected_total";
/// Wall-clock duration of one coordinator cycle.
pub const CYCLE_DURATION: &str = "arb_cycle_duration_seconds";

/// Install the Prometheus recorder and register metric descriptions.
pub fn init_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(OPPORTUNITIES_DETECTED, "Opportunities detected");
    describe_counter!(POSITIONS_CREATED, "Positions created in watching state");
    describe_counter!(POSITIONS_RESOLVED, "Positions resolved, by terminal state");
    describe_counter!(FETCH_RETRIES, "Fetch attempts that failed and were retried");
    describe_counter!(FETCH_FAILURES, "Fetches that exhausted all attempts");
    describe_counter!(QUOTES_REJECTED, "Quotes discarded by validation");
    describe_histogram!(CYCLE_DURATION, "Coordinator cycle duration in seconds");

    Ok(handle)
}

/// Count one detected opportunity.
pub fn inc_opportunity_detected(category: &str) {
    counter!(OPPORTUNITIES_DETECTED, "category" => category.to_string()).increment(1);
}

/// Count one created position.
pub fn inc_position_created(category: &str) {
    counter!(POSITIONS_CREATED, "category" => category.to_string()).increment(1);
}

/// Count one resolved position by terminal state.
pub fn inc_position_resolved(state: PositionState) {
    counter!(POSITIONS_RESOLVED, "state" => state.to_string()).increment(1);
}

/// Count one retried fetch attempt.
pub fn inc_fetch_retry(venue: Venue) {
    counter!(FETCH_RETRIES, "venue" => venue.to_string()).increment(1);
}

/// Count one exhausted fetch.
pub fn inc_fetch_failure(venue: Venue) {
    counter!(FETCH_FAILURES, "venue" => venue.to_string()).increment(1);
}

/// Count one rejected quote.
pub fn inc_quote_rejected(venue: Venue) {
    counter!(QUOTES_REJECTED, "venue" => venue.to_string()).increment(1);
}

/// Record one cycle's duration.
pub fn record_cycle_duration(seconds: f64) {
    histogram!(CYCLE_DURATION).record(seconds);
}

/// RAII timer that records cycle duration on drop.
pub struct CycleTimer {
    start: std::time::Instant,
}

impl CycleTimer {
    /// Start timing a cycle.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for CycleTimer {
    fn default() -> Self {
        Self::start()
    }
}

impl Drop for CycleTimer {
    fn drop(&mut self) {
        record_cycle_duration(self.start.elapsed().as_secs_f64());
    }
}
