//! Per-category performance aggregation.
//!
//! One row per market category, updated in place: how many opportunities were
//! detected, how many resolved profitably, and the running mean of realized
//! profit. The adaptive scheduler reads `success_rate` from here.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::PersistenceError;
use crate::market::MarketCategory;
use crate::storage::PerformanceStore;

/// Aggregated outcomes for one market category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPerformance {
    /// Category this row aggregates. Unique key.
    pub category: MarketCategory,
    /// Opportunities detected, counted once at detection.
    pub opportunities_found: u64,
    /// Resolutions with `actual_profit > 0`.
    pub profitable_count: u64,
    /// Positions resolved so far; denominator for the running profit mean.
    pub resolved_count: u64,
    /// Running mean of realized profit, as a percentage of stake.
    pub avg_profit_pct: Decimal,
    /// `profitable_count / opportunities_found`, as a fraction in [0, 1].
    pub success_rate: Decimal,
    /// Current poll interval in seconds. Written by the scheduler only.
    pub poll_interval_secs: u64,
    /// Last update time.
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl CategoryPerformance {
    /// Fresh row for a category, starting at the base poll interval.
    pub fn new(category: MarketCategory, base_poll_interval_secs: u64) -> Self {
        Self {
            category,
            opportunities_found: 0,
            profitable_count: 0,
            resolved_count: 0,
            avg_profit_pct: Decimal::ZERO,
            success_rate: Decimal::ZERO,
            poll_interval_secs: base_poll_interval_secs,
            last_updated: OffsetDateTime::now_utc(),
        }
    }

    fn recompute_success_rate(&mut self) {
        self.success_rate = if self.opportunities_found == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(self.profitable_count) / Decimal::from(self.opportunities_found)
        };
    }
}

/// Owns all writes to `CategoryPerformance` rows.
pub struct PerformanceTracker {
    store: Arc<dyn PerformanceStore>,
    base_poll_interval_secs: u64,
}

impl PerformanceTracker {
    /// Create a tracker over a performance store.
    pub fn new(store: Arc<dyn PerformanceStore>, base_poll_interval_secs: u64) -> Self {
        Self {
            store,
            base_poll_interval_secs,
        }
    }

    async fn load_or_default(
        &self,
        category: MarketCategory,
    ) -> Result<CategoryPerformance, PersistenceError> {
        Ok(self
            .store
            .get(category)
            .await?
            .unwrap_or_else(|| CategoryPerformance::new(category, self.base_poll_interval_secs)))
    }

    /// Count a detected opportunity. Called once per created position.
    pub async fn record_detection(
        &self,
        category: MarketCategory,
    ) -> Result<CategoryPerformance, PersistenceError> {
        let mut row = self.load_or_default(category).await?;
        row.opportunities_found += 1;
        row.recompute_success_rate();
        row.last_updated = OffsetDateTime::now_utc();
        self.store.upsert(&row).await?;
        debug!(category = %category, found = row.opportunities_found, "Recorded detection");
        Ok(row)
    }

    /// Fold a resolution into the running aggregates.
    pub async fn record_resolution(
        &self,
        category: MarketCategory,
        actual_profit: Decimal,
    ) -> Result<CategoryPerformance, PersistenceError> {
        let mut row = self.load_or_default(category).await?;

        row.resolved_count += 1;
        if actual_profit > Decimal::ZERO {
            row.profitable_count += 1;
        }

        let profit_pct = actual_profit * Decimal::ONE_HUNDRED;
        row.avg_profit_pct += (profit_pct - row.avg_profit_pct) / Decimal::from(row.resolved_count);

        row.recompute_success_rate();
        row.last_updated = OffsetDateTime::now_utc();
        self.store.upsert(&row).await?;
        debug!(
            category = %category,
            success_rate = %row.success_rate,
            avg_profit_pct = %row.avg_profit_pct,
            "Recorded resolution"
        );
        Ok(row)
    }

    /// Persist a recomputed poll interval for a category.
    pub async fn record_poll_interval(
        &self,
        category: MarketCategory,
        poll_interval_secs: u64,
    ) -> Result<(), PersistenceError> {
        let mut row = self.load_or_default(category).await?;
        if row.poll_interval_secs != poll_interval_secs {
            row.poll_interval_secs = poll_interval_secs;
            row.last_updated = OffsetDateTime::now_utc();
            self.store.upsert(&row).await?;
        }
        Ok(())
    }

    /// Current row for a category, if any resolutions or detections exist.
    pub async fn get(
        &self,
        category: MarketCategory,
    ) -> Result<Option<CategoryPerformance>, PersistenceError> {
        self.store.get(category).await
    }
}
