//! End-to-end coordination scenarios over in-memory stores.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::{Duration, OffsetDateTime};

use arbitrage_hunter::config::Config;
use arbitrage_hunter::coordinator::Coordinator;
use arbitrage_hunter::error::FetchError;
use arbitrage_hunter::market::{MarketCategory, Outcome, PriceSource, Quote, Venue};
use arbitrage_hunter::position::{NoSettlement, PositionState, SettlementSource};
use arbitrage_hunter::storage::{
    InMemoryJournal, InMemoryPerformanceStore, InMemoryPositionRepository, PerformanceStore,
    PositionRepository, TaskAction, TaskJournal,
};
use arbitrage_hunter::utils::Shutdown;

/// Venue source returning a fixed quote set, filtered by category.
struct FixedSource {
    venue: Venue,
    quotes: Vec<Quote>,
}

#[async_trait]
impl PriceSource for FixedSource {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn fetch(&self, category: MarketCategory) -> Result<Vec<Quote>, FetchError> {
        Ok(self
            .quotes
            .iter()
            .filter(|q| MarketCategory::categorize(&q.event_name) == category)
            .cloned()
            .collect())
    }
}

fn quote(
    venue: Venue,
    outcome: Outcome,
    probability: Decimal,
    expires_at: Option<OffsetDateTime>,
) -> Quote {
    Quote {
        venue,
        market_id: format!("{venue}_btc150k"),
        event_name: "Will Bitcoin reach $150k by end of 2026?".to_string(),
        outcome,
        probability,
        expires_at,
        observed_at: OffsetDateTime::now_utc(),
    }
}

struct Harness {
    repository: Arc<InMemoryPositionRepository>,
    journal: Arc<InMemoryJournal>,
    performance: Arc<InMemoryPerformanceStore>,
    config: Config,
}

impl Harness {
    fn new() -> Self {
        Self {
            repository: Arc::new(InMemoryPositionRepository::new()),
            journal: Arc::new(InMemoryJournal::new()),
            performance: Arc::new(InMemoryPerformanceStore::new()),
            config: Config::default(),
        }
    }

    fn coordinator_with(
        &self,
        expires_at: Option<OffsetDateTime>,
        settlement: Arc<dyn SettlementSource>,
    ) -> Coordinator {
        let sources: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(FixedSource {
                venue: Venue::Polymarket,
                quotes: vec![quote(Venue::Polymarket, Outcome::Yes, dec!(0.45), expires_at)],
            }),
            Arc::new(FixedSource {
                venue: Venue::Kalshi,
                quotes: vec![quote(Venue::Kalshi, Outcome::No, dec!(0.52), expires_at)],
            }),
        ];
        let shutdown = Shutdown::new();
        Coordinator::new(
            self.config.clone(),
            sources,
            self.repository.clone(),
            self.journal.clone(),
            self.performance.clone(),
            settlement,
            shutdown.listener(),
        )
    }
}

#[tokio::test]
async fn detection_creates_and_enters_a_position() {
    let harness = Harness::new();
    let future = Some(OffsetDateTime::now_utc() + Duration::days(7));
    let mut coordinator = harness.coordinator_with(future, Arc::new(NoSettlement));

    coordinator.resume().await.unwrap();
    coordinator.run_cycle().await.unwrap();

    let open = harness.repository.open_positions().await.unwrap();
    assert_eq!(open.len(), 1);
    let position = &open[0];
    assert_eq!(position.state, PositionState::Entered);
    assert_eq!(position.target_profit, dec!(0.03));
    assert_eq!(position.category, MarketCategory::Crypto);

    // The journal orders the position's steps: detect, place, first monitor.
    let entries = harness.journal.replay_since(None).await.unwrap();
    let actions: Vec<TaskAction> = entries
        .iter()
        .filter(|e| e.subject_id == position.id.to_string())
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![TaskAction::Detect, TaskAction::PlaceOrder, TaskAction::Monitor]
    );

    let row = harness
        .performance
        .get(MarketCategory::Crypto)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.opportunities_found, 1);
}

#[tokio::test]
async fn expiry_resolves_expired_at_target_profit() {
    let harness = Harness::new();
    let past = Some(OffsetDateTime::now_utc() - Duration::minutes(1));
    let mut coordinator = harness.coordinator_with(past, Arc::new(NoSettlement));

    coordinator.resume().await.unwrap();
    // First cycle creates and enters; expiry is already due, so the same
    // cycle resolves it.
    coordinator.run_cycle().await.unwrap();

    assert!(harness.repository.open_positions().await.unwrap().is_empty());

    let row = harness
        .performance
        .get(MarketCategory::Crypto)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.opportunities_found, 1);
    assert_eq!(row.resolved_count, 1);
    assert_eq!(row.profitable_count, 1);
    assert_eq!(row.avg_profit_pct, dec!(3));
    assert_eq!(row.success_rate, dec!(1));
    // success_rate 1.0 halves the base interval.
    assert_eq!(row.poll_interval_secs, harness.config.base_poll_interval_secs / 2);
}

struct LossSettlement;

#[async_trait]
impl SettlementSource for LossSettlement {
    async fn settle(&self, _position: &arbitrage_hunter::position::Position) -> Option<Decimal> {
        Some(dec!(-0.02))
    }
}

#[tokio::test]
async fn contradicting_settlement_resolves_loss_and_slows_polling() {
    let harness = Harness::new();
    let past = Some(OffsetDateTime::now_utc() - Duration::minutes(1));
    let mut coordinator = harness.coordinator_with(past, Arc::new(LossSettlement));

    coordinator.resume().await.unwrap();
    coordinator.run_cycle().await.unwrap();

    let row = harness
        .performance
        .get(MarketCategory::Crypto)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.profitable_count, 0);
    assert_eq!(row.success_rate, dec!(0));
    // success_rate 0 doubles the base interval.
    assert_eq!(
        row.poll_interval_secs,
        harness.config.base_poll_interval_secs * 2
    );
}

#[tokio::test]
async fn restart_does_not_duplicate_an_open_position() {
    let mut harness = Harness::new();
    // Resumption restores last-poll times from the journal; zero intervals
    // keep every category due so the post-restart cycle runs detection again.
    harness.config.base_poll_interval_secs = 0;
    harness.config.min_poll_interval_secs = 0;
    let future = Some(OffsetDateTime::now_utc() + Duration::days(7));

    let mut first = harness.coordinator_with(future, Arc::new(NoSettlement));
    first.resume().await.unwrap();
    first.run_cycle().await.unwrap();
    assert_eq!(harness.repository.len(), 1);
    drop(first);

    // Fresh coordinator over the same stores, same quotes.
    let mut second = harness.coordinator_with(future, Arc::new(NoSettlement));
    second.resume().await.unwrap();
    second.run_cycle().await.unwrap();

    assert_eq!(harness.repository.len(), 1);

    // Exactly one detect/success and one recover per start.
    let entries = harness.journal.replay_since(None).await.unwrap();
    let detects = entries
        .iter()
        .filter(|e| e.action == TaskAction::Detect)
        .count();
    assert_eq!(detects, 1);
    let recovers = entries
        .iter()
        .filter(|e| e.action == TaskAction::Recover)
        .count();
    assert_eq!(recovers, 2);
}

#[tokio::test]
async fn restarted_open_position_keeps_being_monitored() {
    let mut harness = Harness::new();
    harness.config.base_poll_interval_secs = 0;
    harness.config.min_poll_interval_secs = 0;
    let future = Some(OffsetDateTime::now_utc() + Duration::days(7));

    let mut first = harness.coordinator_with(future, Arc::new(NoSettlement));
    first.resume().await.unwrap();
    first.run_cycle().await.unwrap();
    drop(first);

    let before = harness.journal.len();
    let mut second = harness.coordinator_with(future, Arc::new(NoSettlement));
    second.resume().await.unwrap();
    second.run_cycle().await.unwrap();

    let entries = harness.journal.replay_since(None).await.unwrap();
    let monitors = entries
        .iter()
        .skip(before)
        .filter(|e| e.action == TaskAction::Monitor)
        .count();
    assert_eq!(monitors, 1);

    let open = harness.repository.open_positions().await.unwrap();
    assert_eq!(open[0].state, PositionState::Entered);
}
