//! Task journal entry model.
//!
//! Every coordination action and its outcome is journaled. Insertion order is
//! the logical clock for resumption; entries are never mutated or deleted.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

/// The coordination action an entry records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskAction {
    /// Opportunity detection over fetched quotes.
    Detect,
    /// Simulated order placement advancing watching to entered.
    PlaceOrder,
    /// Periodic check of an entered position before expiry.
    Monitor,
    /// Terminal resolution at expiry.
    Resolve,
    /// Process resumption after a stop.
    Recover,
    /// One fetch attempt under the retry executor.
    FetchRetry,
}

/// Outcome of the action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    /// The action completed.
    Success,
    /// The action failed terminally for this cycle.
    Failure,
    /// One attempt failed; another will follow.
    Retry,
}

/// One append-only journal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// When the action ran.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// What ran.
    pub action: TaskAction,
    /// How it went.
    pub status: TaskStatus,
    /// Position id or category the action applied to.
    pub subject_id: String,
    /// Free-form context.
    pub detail: Option<String>,
    /// Error text, for failure/retry entries.
    pub error: Option<String>,
}

impl TaskLogEntry {
    /// New entry timestamped now.
    pub fn new(action: TaskAction, status: TaskStatus, subject_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: OffsetDateTime::now_utc(),
            action,
            status,
            subject_id: subject_id.into(),
            detail: None,
            error: None,
        }
    }

    /// Attach free-form context.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach error text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
