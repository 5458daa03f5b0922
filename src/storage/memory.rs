//! In-memory storage implementations on DashMap.
//!
//! Journal ordering uses a monotonic sequence counter as insertion order;
//! timestamps alone are not unique enough under concurrent appends.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::market::MarketCategory;
use crate::performance::CategoryPerformance;
use crate::position::{Position, PositionKey, PositionState};

use super::journal::TaskLogEntry;
use super::repository::{PerformanceStore, PositionRepository, TaskJournal};

/// DashMap-backed position repository.
#[derive(Debug, Default)]
pub struct InMemoryPositionRepository {
    positions: DashMap<Uuid, Position>,
}

impl InMemoryPositionRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored positions, any state.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no positions are stored.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[async_trait]
impl PositionRepository for InMemoryPositionRepository {
    async fn upsert(&self, position: &Position) -> Result<(), PersistenceError> {
        self.positions.insert(position.id, position.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Position>, PersistenceError> {
        Ok(self.positions.get(&id).map(|p| p.value().clone()))
    }

    async fn open_positions(&self) -> Result<Vec<Position>, PersistenceError> {
        Ok(self
            .positions
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.value().clone())
            .collect())
    }

    async fn expiring_before(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Position>, PersistenceError> {
        Ok(self
            .positions
            .iter()
            .filter(|p| p.state == PositionState::Entered && p.expires_at <= now)
            .map(|p| p.value().clone())
            .collect())
    }

    async fn find_open_by_key(
        &self,
        key: &PositionKey,
    ) -> Result<Option<Position>, PersistenceError> {
        // `p.key()` on the guard is DashMap's key accessor, not Position::key.
        Ok(self
            .positions
            .iter()
            .find(|p| p.value().is_open() && p.value().key() == *key)
            .map(|p| p.value().clone()))
    }
}

/// DashMap-backed append-only journal keyed by sequence number.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    entries: DashMap<u64, TaskLogEntry>,
    seq: AtomicU64,
}

impl InMemoryJournal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of journaled entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ordered(&self) -> Vec<(u64, TaskLogEntry)> {
        let mut all: Vec<(u64, TaskLogEntry)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all
    }
}

#[async_trait]
impl TaskJournal for InMemoryJournal {
    async fn append(&self, entry: TaskLogEntry) -> Result<(), PersistenceError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(seq, entry);
        Ok(())
    }

    async fn replay_since(
        &self,
        since: Option<OffsetDateTime>,
    ) -> Result<Vec<TaskLogEntry>, PersistenceError> {
        Ok(self
            .ordered()
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|e| since.map_or(true, |s| e.timestamp >= s))
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<TaskLogEntry>, PersistenceError> {
        let mut all = self.ordered();
        all.reverse();
        Ok(all.into_iter().take(limit).map(|(_, e)| e).collect())
    }
}

/// DashMap-backed performance rows keyed by category.
#[derive(Debug, Default)]
pub struct InMemoryPerformanceStore {
    rows: DashMap<MarketCategory, CategoryPerformance>,
}

impl InMemoryPerformanceStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PerformanceStore for InMemoryPerformanceStore {
    async fn upsert(&self, row: &CategoryPerformance) -> Result<(), PersistenceError> {
        self.rows.insert(row.category, row.clone());
        Ok(())
    }

    async fn get(
        &self,
        category: MarketCategory,
    ) -> Result<Option<CategoryPerformance>, PersistenceError> {
        Ok(self.rows.get(&category).map(|r| r.value().clone()))
    }

    async fn all(&self) -> Result<Vec<CategoryPerformance>, PersistenceError> {
        Ok(self.rows.iter().map(|r| r.value().clone()).collect())
    }
}
