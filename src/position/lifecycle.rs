//! Position lifecycle manager: sole owner of state transitions.
//!
//! Every mutation of a position runs under a per-position advisory lock so a
//! monitor scan and a resolve can never race on the same record. Each
//! transition is journaled from inside the critical section, which keeps the
//! journal ordered per position.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::arbitrage::Opportunity;
use crate::error::{PersistenceError, Result, TransitionError};
use crate::market::normalize_event_name;
use crate::metrics;
use crate::storage::{PositionRepository, TaskAction, TaskJournal, TaskLogEntry, TaskStatus};

use super::model::{Position, PositionKey, PositionState};

/// Deterministic settlement signal for an expired position. `None` means no
/// settlement data is available, in which case the arbitrage is taken to have
/// realized its target by construction.
#[async_trait]
pub trait SettlementSource: Send + Sync {
    /// Realized profit fraction for the position, if settlement data exists.
    async fn settle(&self, position: &Position) -> Option<Decimal>;
}

/// Settlement source with no data. Every expiry resolves as `expired` with
/// the targeted profit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSettlement;

#[async_trait]
impl SettlementSource for NoSettlement {
    async fn settle(&self, _position: &Position) -> Option<Decimal> {
        None
    }
}

/// Owns the position state machine.
pub struct LifecycleManager {
    repository: Arc<dyn PositionRepository>,
    journal: Arc<dyn TaskJournal>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    default_expiry_days: i64,
}

impl LifecycleManager {
    /// Create a manager over a repository and journal.
    pub fn new(
        repository: Arc<dyn PositionRepository>,
        journal: Arc<dyn TaskJournal>,
        default_expiry_days: i64,
    ) -> Self {
        Self {
            repository,
            journal,
            locks: DashMap::new(),
            default_expiry_days,
        }
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, id: Uuid) -> Result<Position> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| PersistenceError::PositionStore(format!("position {id} not found")).into())
    }

    /// Create a `watching` position for a detected opportunity. An already
    /// open position for the same `(event, venue_a, venue_b)` triple
    /// suppresses creation and returns `None`.
    #[instrument(skip(self, opportunity), fields(event = %opportunity.event_name))]
    pub async fn create(
        &self,
        opportunity: &Opportunity,
        now: OffsetDateTime,
    ) -> Result<Option<Position>> {
        let key = PositionKey {
            event_name: normalize_event_name(&opportunity.event_name),
            venue_a: opportunity.quote_a.venue,
            venue_b: opportunity.quote_b.venue,
        };

        if let Some(open) = self.repository.find_open_by_key(&key).await? {
            debug!(position_id = %open.id, "Open position exists, duplicate suppressed");
            return Ok(None);
        }

        let position = Position::from_opportunity(opportunity, now, self.default_expiry_days);
        self.repository.upsert(&position).await?;
        self.journal
            .append(
                TaskLogEntry::new(TaskAction::Detect, TaskStatus::Success, position.id.to_string())
                    .with_detail(format!(
                        "{} target_profit={}",
                        position.event_name, position.target_profit
                    )),
            )
            .await?;

        metrics::inc_position_created(&position.category.to_string());
        info!(
            position_id = %position.id,
            category = %position.category,
            target_profit = %position.target_profit,
            "Position created"
        );
        Ok(Some(position))
    }

    /// Advance a `watching` position to `entered` (simulated order placement).
    #[instrument(skip(self))]
    pub async fn enter(&self, id: Uuid, now: OffsetDateTime) -> Result<Position> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut position = self.load(id).await?;
        self.check_transition(&position, PositionState::Entered, TaskAction::PlaceOrder)
            .await?;

        position.state = PositionState::Entered;
        position.last_checked_at = now;
        self.repository.upsert(&position).await?;
        self.journal
            .append(
                TaskLogEntry::new(TaskAction::PlaceOrder, TaskStatus::Success, id.to_string())
                    .with_detail(format!(
                        "stake_a={} stake_b={}",
                        position.stake_a, position.stake_b
                    )),
            )
            .await?;

        info!(position_id = %id, "Simulated orders placed, position entered");
        Ok(position)
    }

    /// Touch an `entered` position before expiry: update `last_checked_at`
    /// and journal the check. Positions in any other state are skipped.
    #[instrument(skip(self))]
    pub async fn monitor(&self, id: Uuid, now: OffsetDateTime) -> Result<Position> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut position = self.load(id).await?;
        if position.state != PositionState::Entered {
            return Ok(position);
        }

        position.last_checked_at = now;
        self.repository.upsert(&position).await?;
        self.journal
            .append(
                TaskLogEntry::new(TaskAction::Monitor, TaskStatus::Success, id.to_string())
                    .with_detail(format!("days_held={}", position.days_held())),
            )
            .await?;

        Ok(position)
    }

    /// Resolve an expired position into a terminal state.
    ///
    /// With no settlement data the position resolves `expired` with
    /// `actual_profit = target_profit`: the equal-payout stakes realize the
    /// target regardless of which side wins. A settlement signal overrides
    /// that: positive realized profit resolves `profitable`, zero or negative
    /// resolves `loss` (a venue default scenario).
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        id: Uuid,
        settlement: Option<Decimal>,
        now: OffsetDateTime,
    ) -> Result<Position> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut position = self.load(id).await?;
        let (to, actual_profit) = match settlement {
            None => (PositionState::Expired, position.target_profit),
            Some(profit) if profit > Decimal::ZERO => (PositionState::Profitable, profit),
            Some(profit) => (PositionState::Loss, profit),
        };

        self.check_transition(&position, to, TaskAction::Resolve)
            .await?;

        position.state = to;
        position.actual_profit = Some(actual_profit);
        position.resolved_at = Some(now);
        position.last_checked_at = now;
        self.repository.upsert(&position).await?;
        self.journal
            .append(
                TaskLogEntry::new(TaskAction::Resolve, TaskStatus::Success, id.to_string())
                    .with_detail(format!("state={to} actual_profit={actual_profit}")),
            )
            .await?;

        drop(_guard);
        self.locks.remove(&id);

        metrics::inc_position_resolved(to);
        info!(
            position_id = %id,
            state = %to,
            actual_profit = %actual_profit,
            "Position resolved"
        );
        Ok(position)
    }

    /// Journal-and-fail for a forbidden transition. The position is never
    /// mutated.
    async fn check_transition(
        &self,
        position: &Position,
        to: PositionState,
        action: TaskAction,
    ) -> Result<()> {
        if position.state.can_transition_to(to) {
            return Ok(());
        }

        let err = TransitionError {
            position_id: position.id,
            from: position.state,
            to,
        };
        warn!(position_id = %position.id, %err, "Invalid transition rejected");
        self.journal
            .append(
                TaskLogEntry::new(action, TaskStatus::Failure, position.id.to_string())
                    .with_error(err.to_string()),
            )
            .await?;
        Err(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::market::{MarketCategory, Outcome, Quote, Venue};
    use crate::storage::{InMemoryJournal, InMemoryPositionRepository};
    use rust_decimal_macros::dec;

    fn opportunity() -> Opportunity {
        let now = OffsetDateTime::now_utc();
        let quote = |venue, outcome, probability| Quote {
            venue,
            market_id: "m".to_string(),
            event_name: "Will Bitcoin reach $150k by end of 2026?".to_string(),
            outcome,
            probability,
            expires_at: None,
            observed_at: now,
        };
        Opportunity {
            event_name: "Will Bitcoin reach $150k by end of 2026?".to_string(),
            category: MarketCategory::Crypto,
            quote_a: quote(Venue::Polymarket, Outcome::Yes, dec!(0.45)),
            quote_b: quote(Venue::Kalshi, Outcome::No, dec!(0.52)),
            stake_a: dec!(46.39),
            stake_b: dec!(53.61),
            profit_fraction: dec!(0.03),
            expires_at: None,
        }
    }

    fn manager() -> (LifecycleManager, Arc<InMemoryJournal>) {
        let journal = Arc::new(InMemoryJournal::new());
        let manager = LifecycleManager::new(
            Arc::new(InMemoryPositionRepository::new()),
            journal.clone(),
            30,
        );
        (manager, journal)
    }

    #[tokio::test]
    async fn create_then_enter_follows_state_machine() {
        let (manager, journal) = manager();
        let now = OffsetDateTime::now_utc();

        let position = manager.create(&opportunity(), now).await.unwrap().unwrap();
        assert_eq!(position.state, PositionState::Watching);

        let position = manager.enter(position.id, now).await.unwrap();
        assert_eq!(position.state, PositionState::Entered);

        let entries = journal.replay_since(None).await.unwrap();
        assert_eq!(entries[0].action, TaskAction::Detect);
        assert_eq!(entries[1].action, TaskAction::PlaceOrder);
        assert!(entries.iter().all(|e| e.status == TaskStatus::Success));
    }

    #[tokio::test]
    async fn duplicate_open_triple_suppresses_creation() {
        let (manager, _) = manager();
        let now = OffsetDateTime::now_utc();

        let first = manager.create(&opportunity(), now).await.unwrap();
        assert!(first.is_some());

        let second = manager.create(&opportunity(), now).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn resolution_after_terminal_state_allows_new_position() {
        let (manager, _) = manager();
        let now = OffsetDateTime::now_utc();

        let position = manager.create(&opportunity(), now).await.unwrap().unwrap();
        manager.enter(position.id, now).await.unwrap();
        manager.resolve(position.id, None, now).await.unwrap();

        let replacement = manager.create(&opportunity(), now).await.unwrap();
        assert!(replacement.is_some());
    }

    #[tokio::test]
    async fn resolve_without_settlement_expires_at_target() {
        let (manager, _) = manager();
        let now = OffsetDateTime::now_utc();

        let position = manager.create(&opportunity(), now).await.unwrap().unwrap();
        manager.enter(position.id, now).await.unwrap();

        let resolved = manager.resolve(position.id, None, now).await.unwrap();
        assert_eq!(resolved.state, PositionState::Expired);
        assert_eq!(resolved.actual_profit, Some(dec!(0.03)));
        assert!(resolved.resolved_at.is_some());
    }

    #[tokio::test]
    async fn settlement_signal_overrides_expiry_classification() {
        let (manager, _) = manager();
        let now = OffsetDateTime::now_utc();

        let p1 = manager.create(&opportunity(), now).await.unwrap().unwrap();
        manager.enter(p1.id, now).await.unwrap();
        let resolved = manager.resolve(p1.id, Some(dec!(0.05)), now).await.unwrap();
        assert_eq!(resolved.state, PositionState::Profitable);
        assert_eq!(resolved.actual_profit, Some(dec!(0.05)));

        let p2 = manager.create(&opportunity(), now).await.unwrap().unwrap();
        manager.enter(p2.id, now).await.unwrap();
        let resolved = manager.resolve(p2.id, Some(dec!(-0.02)), now).await.unwrap();
        assert_eq!(resolved.state, PositionState::Loss);
        assert_eq!(resolved.actual_profit, Some(dec!(-0.02)));
    }

    #[tokio::test]
    async fn terminal_positions_reject_further_transitions() {
        let (manager, journal) = manager();
        let now = OffsetDateTime::now_utc();

        let position = manager.create(&opportunity(), now).await.unwrap().unwrap();
        manager.enter(position.id, now).await.unwrap();
        manager.resolve(position.id, None, now).await.unwrap();

        let err = manager.resolve(position.id, None, now).await.unwrap_err();
        assert!(matches!(err, AgentError::Transition(_)));

        let entries = journal.replay_since(None).await.unwrap();
        let failure = entries.last().unwrap();
        assert_eq!(failure.action, TaskAction::Resolve);
        assert_eq!(failure.status, TaskStatus::Failure);
        assert!(failure.error.is_some());
    }

    #[tokio::test]
    async fn monitor_updates_last_checked_only_for_entered() {
        let (manager, journal) = manager();
        let now = OffsetDateTime::now_utc();
        let later = now + time::Duration::hours(6);

        let position = manager.create(&opportunity(), now).await.unwrap().unwrap();

        // Watching positions are skipped without journaling.
        let before = journal.len();
        manager.monitor(position.id, later).await.unwrap();
        assert_eq!(journal.len(), before);

        manager.enter(position.id, now).await.unwrap();
        let monitored = manager.monitor(position.id, later).await.unwrap();
        assert_eq!(monitored.last_checked_at, later);

        let entries = journal.replay_since(None).await.unwrap();
        assert_eq!(entries.last().unwrap().action, TaskAction::Monitor);
    }
}
