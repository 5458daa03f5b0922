//! Adaptive per-category polling cadence.
//!
//! Categories that resolve profitably more than half the time get polled at
//! twice the base cadence; categories under a 30% success rate drop to half.
//! Recomputation is idempotent: the interval is a pure function of the
//! success rate, clamped into the configured bounds. The coordinator is the
//! only writer; everything else reads.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::market::MarketCategory;

const FAST_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 1); // 0.5
const SLOW_THRESHOLD: Decimal = Decimal::from_parts(3, 0, 0, false, 1); // 0.3

/// Polling state for one category.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CategoryCadence {
    /// When the category was last polled, if ever.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_polled_at: Option<OffsetDateTime>,
    /// Current poll interval in seconds.
    pub poll_interval_secs: u64,
}

/// Converts per-category success rates into poll intervals and tracks when
/// each category is next due.
pub struct AdaptiveScheduler {
    base_secs: u64,
    min_secs: u64,
    max_secs: u64,
    cadences: DashMap<MarketCategory, CategoryCadence>,
}

impl AdaptiveScheduler {
    /// New scheduler with base and clamp bounds, all in seconds.
    pub fn new(base_secs: u64, min_secs: u64, max_secs: u64) -> Self {
        Self {
            base_secs,
            min_secs,
            max_secs,
            cadences: DashMap::new(),
        }
    }

    /// Pure interval computation from a success-rate fraction.
    pub fn compute_interval(&self, success_rate: Decimal) -> u64 {
        let interval = if success_rate > FAST_THRESHOLD {
            self.base_secs / 2
        } else if success_rate >= SLOW_THRESHOLD {
            self.base_secs
        } else {
            self.base_secs * 2
        };
        interval.clamp(self.min_secs, self.max_secs)
    }

    /// Recompute and store a category's interval. Idempotent for an
    /// unchanged success rate.
    pub fn recompute(&self, category: MarketCategory, success_rate: Decimal) -> u64 {
        let interval = self.compute_interval(success_rate);
        let mut cadence = self.cadences.entry(category).or_insert(CategoryCadence {
            last_polled_at: None,
            poll_interval_secs: self.base_secs,
        });
        if cadence.poll_interval_secs != interval {
            debug!(
                category = %category,
                success_rate = %success_rate,
                from = cadence.poll_interval_secs,
                to = interval,
                "Poll interval adjusted"
            );
            cadence.poll_interval_secs = interval;
        }
        interval
    }

    /// Whether a category is due for a poll. Never-polled categories are
    /// always due.
    pub fn is_due(&self, category: MarketCategory, now: OffsetDateTime) -> bool {
        match self.cadences.get(&category) {
            Some(cadence) => match cadence.last_polled_at {
                Some(last) => {
                    last + time::Duration::seconds(cadence.poll_interval_secs as i64) <= now
                }
                None => true,
            },
            None => true,
        }
    }

    /// Record that a category was polled now.
    pub fn mark_polled(&self, category: MarketCategory, now: OffsetDateTime) {
        let mut cadence = self.cadences.entry(category).or_insert(CategoryCadence {
            last_polled_at: None,
            poll_interval_secs: self.base_secs,
        });
        cadence.last_polled_at = Some(now);
    }

    /// Restore a category's last-poll time, used by resumption.
    pub fn restore(&self, category: MarketCategory, last_polled_at: OffsetDateTime) {
        self.mark_polled(category, last_polled_at);
    }

    /// Current cadence for a category, if it has ever been touched.
    pub fn cadence(&self, category: MarketCategory) -> Option<CategoryCadence> {
        self.cadences.get(&category).map(|c| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::Duration;

    fn scheduler() -> AdaptiveScheduler {
        AdaptiveScheduler::new(60, 30, 240)
    }

    #[test]
    fn thresholds_map_to_intervals() {
        let s = scheduler();
        assert_eq!(s.compute_interval(dec!(0.71)), 30);
        assert_eq!(s.compute_interval(dec!(0.5)), 60);
        assert_eq!(s.compute_interval(dec!(0.4)), 60);
        assert_eq!(s.compute_interval(dec!(0.3)), 60);
        assert_eq!(s.compute_interval(dec!(0.2)), 120);
    }

    #[test]
    fn intervals_clamp_to_bounds() {
        let s = AdaptiveScheduler::new(50, 40, 80);
        // base/2 = 25 clamps up to 40; base*2 = 100 clamps down to 80.
        assert_eq!(s.compute_interval(dec!(0.9)), 40);
        assert_eq!(s.compute_interval(dec!(0.1)), 80);
    }

    #[test]
    fn recompute_is_idempotent() {
        let s = scheduler();
        let first = s.recompute(MarketCategory::Crypto, dec!(0.6));
        let second = s.recompute(MarketCategory::Crypto, dec!(0.6));
        assert_eq!(first, second);
        assert_eq!(
            s.cadence(MarketCategory::Crypto).unwrap().poll_interval_secs,
            30
        );
    }

    #[test]
    fn due_when_never_polled_and_after_interval() {
        let s = scheduler();
        let now = OffsetDateTime::now_utc();

        assert!(s.is_due(MarketCategory::Sports, now));

        s.mark_polled(MarketCategory::Sports, now);
        assert!(!s.is_due(MarketCategory::Sports, now + Duration::seconds(59)));
        assert!(s.is_due(MarketCategory::Sports, now + Duration::seconds(60)));
    }

    #[test]
    fn restore_reinstates_last_poll_time() {
        let s = scheduler();
        let now = OffsetDateTime::now_utc();

        s.restore(MarketCategory::Politics, now - Duration::seconds(10));
        assert!(!s.is_due(MarketCategory::Politics, now));
        assert!(s.is_due(MarketCategory::Politics, now + Duration::seconds(51)));
    }
}
