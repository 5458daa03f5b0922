//! Storage capability traits.
//!
//! The coordination core treats durable storage as three opaque collaborators:
//! a key-indexed position repository, an append-only task journal, and a
//! per-category performance store. In-memory implementations live in
//! [`super::memory`]; a document database would slot in behind the same traits.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::market::MarketCategory;
use crate::performance::CategoryPerformance;
use crate::position::{Position, PositionKey};

use super::journal::TaskLogEntry;

/// Key-indexed document store for positions.
#[async_trait]
pub trait PositionRepository: Send + Sync {
    /// Insert or replace a position by id.
    async fn upsert(&self, position: &Position) -> Result<(), PersistenceError>;

    /// Point read by id.
    async fn get(&self, id: Uuid) -> Result<Option<Position>, PersistenceError>;

    /// All non-terminal positions.
    async fn open_positions(&self) -> Result<Vec<Position>, PersistenceError>;

    /// Entered positions with `expires_at <= now`.
    async fn expiring_before(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Position>, PersistenceError>;

    /// The open position for an identity triple, if one exists. Used for
    /// duplicate-open suppression.
    async fn find_open_by_key(
        &self,
        key: &PositionKey,
    ) -> Result<Option<Position>, PersistenceError>;
}

/// Append-only journal with ordered range reads.
#[async_trait]
pub trait TaskJournal: Send + Sync {
    /// Append one entry. Never mutates prior entries.
    async fn append(&self, entry: TaskLogEntry) -> Result<(), PersistenceError>;

    /// Entries at or after `since` (all entries when `None`), in insertion
    /// order. Consumed by the resumption routine.
    async fn replay_since(
        &self,
        since: Option<OffsetDateTime>,
    ) -> Result<Vec<TaskLogEntry>, PersistenceError>;

    /// The newest `limit` entries, most recent first. Dashboard reads.
    async fn recent(&self, limit: usize) -> Result<Vec<TaskLogEntry>, PersistenceError>;
}

/// Per-category performance rows, one per category, updated in place.
#[async_trait]
pub trait PerformanceStore: Send + Sync {
    /// Insert or replace the row for the entry's category.
    async fn upsert(&self, row: &CategoryPerformance) -> Result<(), PersistenceError>;

    /// Read one category's row.
    async fn get(
        &self,
        category: MarketCategory,
    ) -> Result<Option<CategoryPerformance>, PersistenceError>;

    /// All rows.
    async fn all(&self) -> Result<Vec<CategoryPerformance>, PersistenceError>;
}
