//! Unified error types for the arbitrage agent.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::market::Venue;
use crate::position::PositionState;

/// Unified error type for the arbitrage agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// External fetch error (transient, bounded-retry).
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Invalid position state transition.
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Repository or journal write failure. Fatal: the process must stop
    /// rather than continue with an unconfirmed state change.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Malformed quote from a venue.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from fetching quotes at a venue. Always non-fatal to the cycle:
/// the coordinator skips the venue for the current tick.
#[derive(Error, Debug)]
pub enum FetchError {
    /// A single attempt failed; eligible for retry.
    #[error("{venue} fetch failed: {reason}")]
    Transient {
        /// The venue whose fetch failed.
        venue: Venue,
        /// Reason for failure.
        reason: String,
    },

    /// All retry attempts failed.
    #[error("{venue} fetch failed after {attempts} attempts: {reason}")]
    Exhausted {
        /// The venue whose fetch failed.
        venue: Venue,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure reason.
        reason: String,
    },

    /// A shutdown signal aborted a pending backoff wait. Not counted
    /// as a failure.
    #[error("fetch cancelled by shutdown")]
    Cancelled,
}

impl FetchError {
    /// Whether this outcome was a shutdown-triggered cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Attempted transition that the position state machine forbids.
/// The position is left untouched; the cycle continues.
#[derive(Error, Debug)]
#[error("invalid transition for position {position_id}: {from} -> {to}")]
pub struct TransitionError {
    /// Position the transition was attempted on.
    pub position_id: Uuid,
    /// Current state.
    pub from: PositionState,
    /// Requested state.
    pub to: PositionState,
}

/// Write to the repository or journal failed. Treated as fatal so that
/// in-memory and durable state cannot silently diverge before a resume.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Position repository write failed.
    #[error("position store write failed: {0}")]
    PositionStore(String),

    /// Task journal append failed.
    #[error("journal append failed: {0}")]
    Journal(String),

    /// Performance store write failed.
    #[error("performance store write failed: {0}")]
    PerformanceStore(String),
}

/// A quote that cannot be acted on. The quote is discarded and journaled;
/// detection for its pair is skipped for the cycle.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Probability outside the valid [0, 1] range.
    #[error("{venue} quote for '{event_name}' has probability {probability} outside [0, 1]")]
    ProbabilityOutOfRange {
        /// Venue the quote came from.
        venue: Venue,
        /// Event the quote belongs to.
        event_name: String,
        /// The offending probability.
        probability: Decimal,
    },

    /// Quote is missing its event name.
    #[error("{venue} quote has empty event name")]
    MissingEventName {
        /// Venue the quote came from.
        venue: Venue,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AgentError>;
