//! Top-level coordination loop.
//!
//! One iteration per tick: for every category due for polling, fetch quotes
//! from both venues under the retry executor, detect opportunities, create
//! and advance positions, scan entered positions for expiry, fold results
//! into the performance tracker, and recompute the polling cadence. Every
//! step lands in the task journal.
//!
//! On start, before the first tick, resumption replays the journal to
//! reconstruct per-category poll times and reloads open positions from the
//! repository. The journal is an audit and idempotency trail only; the
//! repository is the source of truth for position state.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use strum::IntoEnumIterator;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::arbitrage::find_opportunities;
use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::market::{MarketCategory, PriceSource, Quote, Venue};
use crate::metrics::{self, CycleTimer};
use crate::performance::PerformanceTracker;
use crate::position::{LifecycleManager, PositionState, SettlementSource};
use crate::retry::with_retry;
use crate::scheduler::AdaptiveScheduler;
use crate::storage::{
    PerformanceStore, PositionRepository, TaskAction, TaskJournal, TaskLogEntry, TaskStatus,
};
use crate::utils::ShutdownListener;

/// Completed (subject, action) pairs from the interrupted tick, consulted by
/// the first cycle after a resume so no step runs twice.
type ResumedSteps = HashSet<(String, TaskAction)>;

/// The coordination engine. Single instance per store; holds the only write
/// access to the schedule.
pub struct Coordinator {
    config: Config,
    sources: Vec<Arc<dyn PriceSource>>,
    repository: Arc<dyn PositionRepository>,
    journal: Arc<dyn TaskJournal>,
    lifecycle: LifecycleManager,
    tracker: PerformanceTracker,
    scheduler: AdaptiveScheduler,
    settlement: Arc<dyn SettlementSource>,
    shutdown: ShutdownListener,
    resumed_steps: Option<ResumedSteps>,
}

impl Coordinator {
    /// Wire up the engine from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        sources: Vec<Arc<dyn PriceSource>>,
        repository: Arc<dyn PositionRepository>,
        journal: Arc<dyn TaskJournal>,
        performance: Arc<dyn PerformanceStore>,
        settlement: Arc<dyn SettlementSource>,
        shutdown: ShutdownListener,
    ) -> Self {
        let lifecycle = LifecycleManager::new(
            repository.clone(),
            journal.clone(),
            config.default_expiry_days,
        );
        let tracker = PerformanceTracker::new(performance, config.base_poll_interval_secs);
        let scheduler = AdaptiveScheduler::new(
            config.base_poll_interval_secs,
            config.min_poll_interval_secs,
            config.max_poll_interval_secs,
        );

        Self {
            config,
            sources,
            repository,
            journal,
            lifecycle,
            tracker,
            scheduler,
            settlement,
            shutdown,
            resumed_steps: None,
        }
    }

    /// Tick until shutdown. Call [`Coordinator::resume`] first. Persistence
    /// failures are fatal and propagate.
    pub async fn run(&mut self) -> Result<()> {
        let mut tick =
            tokio::time::interval(std::time::Duration::from_secs(self.config.tick_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tick.tick() => {
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    self.run_cycle().await?;
                }
            }
        }

        info!("Coordinator drained");
        Ok(())
    }

    /// Reconstruct scheduling state and open positions after a stop.
    #[instrument(skip(self))]
    pub async fn resume(&mut self) -> Result<()> {
        let entries = self.journal.replay_since(None).await?;

        // Latest journaled action per category feeds last_polled_at.
        let mut last_recover = None;
        for (i, entry) in entries.iter().enumerate() {
            if entry.action == TaskAction::Recover {
                last_recover = Some(i);
            }
            if let Ok(category) = MarketCategory::from_str(&entry.subject_id) {
                self.scheduler.restore(category, entry.timestamp);
            }
        }

        // State-changing steps already journaled success after the last
        // recover (the interrupted tick) are not re-issued by the first
        // cycle. Monitor touches are idempotent and excluded.
        let resumed: ResumedSteps = entries
            .iter()
            .skip(last_recover.map_or(0, |i| i + 1))
            .filter(|e| {
                e.status == TaskStatus::Success
                    && matches!(e.action, TaskAction::PlaceOrder | TaskAction::Resolve)
            })
            .map(|e| (e.subject_id.clone(), e.action))
            .collect();

        let open = self.repository.open_positions().await?;
        if !entries.is_empty() || !open.is_empty() {
            info!(
                journal_entries = entries.len(),
                open_positions = open.len(),
                "Resuming from persisted state"
            );
        }

        self.journal
            .append(
                TaskLogEntry::new(TaskAction::Recover, TaskStatus::Success, "coordinator")
                    .with_detail(format!(
                        "journal_entries={} open_positions={}",
                        entries.len(),
                        open.len()
                    )),
            )
            .await?;

        self.resumed_steps = Some(resumed);
        Ok(())
    }

    /// One full coordination cycle over all due categories.
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> Result<()> {
        let _timer = CycleTimer::start();
        let now = OffsetDateTime::now_utc();

        let due: Vec<MarketCategory> = MarketCategory::iter()
            .filter(|c| self.scheduler.is_due(*c, now))
            .collect();
        if due.is_empty() {
            return Ok(());
        }

        // Consumed only once real work starts; an idle tick keeps the
        // resumed-step set intact for the first working cycle.
        let resumed_steps = self.resumed_steps.take().unwrap_or_default();

        let quotes = self.fetch_due(&due).await?;

        for &category in &due {
            if self.shutdown.is_triggered() {
                return Ok(());
            }

            if let Some(by_venue) = quotes.get(&category) {
                self.detect_and_open(category, by_venue, &resumed_steps, now)
                    .await?;
            }

            self.advance_positions(category, &resumed_steps, now).await?;
            self.scheduler.mark_polled(category, now);
        }

        Ok(())
    }

    /// Fetch quotes for all due categories from every venue, bounded
    /// concurrent, each fetch wrapped in the retry executor. A venue that
    /// exhausts its retries is skipped for this cycle.
    async fn fetch_due(
        &self,
        due: &[MarketCategory],
    ) -> Result<HashMap<MarketCategory, HashMap<Venue, Vec<Quote>>>> {
        let mut jobs = Vec::new();
        for &category in due {
            for source in &self.sources {
                let source = source.clone();
                let journal = self.journal.clone();
                let mut listener = self.shutdown.clone();
                let max_attempts = self.config.max_fetch_attempts;
                jobs.push(async move {
                    let subject = category.to_string();
                    let result = with_retry(
                        source.venue(),
                        &subject,
                        max_attempts,
                        &*journal,
                        &mut listener,
                        || source.fetch(category),
                    )
                    .await;
                    (category, source.venue(), result)
                });
            }
        }

        let results: Vec<(MarketCategory, Venue, Result<Vec<Quote>>)> = stream::iter(jobs)
            .buffer_unordered(self.config.fetch_concurrency)
            .collect()
            .await;

        let mut quotes: HashMap<MarketCategory, HashMap<Venue, Vec<Quote>>> = HashMap::new();
        for (category, venue, result) in results {
            match result {
                Ok(fetched) => {
                    let valid = self.discard_invalid(category, fetched).await?;
                    quotes.entry(category).or_default().insert(venue, valid);
                }
                Err(AgentError::Fetch(err)) => {
                    if !err.is_cancelled() {
                        warn!(venue = %venue, category = %category, error = %err, "Venue skipped for this cycle");
                    }
                }
                // Anything else is a persistence failure from the retry
                // executor's journaling; fatal.
                Err(err) => return Err(err),
            }
        }
        Ok(quotes)
    }

    /// Drop malformed quotes, journaling each discard.
    async fn discard_invalid(
        &self,
        category: MarketCategory,
        fetched: Vec<Quote>,
    ) -> Result<Vec<Quote>> {
        let mut valid = Vec::with_capacity(fetched.len());
        for quote in fetched {
            match quote.validate() {
                Ok(()) => valid.push(quote),
                Err(err) => {
                    metrics::inc_quote_rejected(quote.venue);
                    warn!(venue = %quote.venue, error = %err, "Quote discarded");
                    self.journal
                        .append(
                            TaskLogEntry::new(
                                TaskAction::Detect,
                                TaskStatus::Failure,
                                category.to_string(),
                            )
                            .with_error(err.to_string()),
                        )
                        .await?;
                }
            }
        }
        Ok(valid)
    }

    /// Run detection for one category and open positions for hits. Each new
    /// position advances straight to `entered` in the same cycle.
    async fn detect_and_open(
        &self,
        category: MarketCategory,
        by_venue: &HashMap<Venue, Vec<Quote>>,
        resumed_steps: &ResumedSteps,
        now: OffsetDateTime,
    ) -> Result<()> {
        let (Some(quotes_a), Some(quotes_b)) = (
            by_venue.get(&Venue::Polymarket),
            by_venue.get(&Venue::Kalshi),
        ) else {
            // Pair matching needs both venues.
            return Ok(());
        };

        for opportunity in find_opportunities(quotes_a, quotes_b, self.config.total_stake) {
            metrics::inc_opportunity_detected(&category.to_string());

            let Some(position) = self.lifecycle.create(&opportunity, now).await? else {
                continue;
            };
            self.tracker.record_detection(category).await?;

            if resumed_steps.contains(&(position.id.to_string(), TaskAction::PlaceOrder)) {
                continue;
            }
            match self.lifecycle.enter(position.id, now).await {
                Ok(_) => {}
                Err(AgentError::Transition(err)) => {
                    warn!(error = %err, "Order placement skipped");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Advance every open position in a category: enter stragglers still in
    /// `watching`, resolve those past expiry, monitor the rest.
    async fn advance_positions(
        &self,
        category: MarketCategory,
        resumed_steps: &ResumedSteps,
        now: OffsetDateTime,
    ) -> Result<()> {
        // Entered positions past expiry first, via the repository's range
        // query, so a resolved position is gone before the monitor scan.
        let expiring = self.repository.expiring_before(now).await?;
        for position in expiring.into_iter().filter(|p| p.category == category) {
            let id = position.id;
            if resumed_steps.contains(&(id.to_string(), TaskAction::Resolve)) {
                continue;
            }
            let settlement = self.settlement.settle(&position).await;
            match self.lifecycle.resolve(id, settlement, now).await {
                Ok(resolved) => {
                    let actual = resolved.actual_profit.unwrap_or(resolved.target_profit);
                    let row = self.tracker.record_resolution(category, actual).await?;
                    let interval = self.scheduler.recompute(category, row.success_rate);
                    self.tracker.record_poll_interval(category, interval).await?;
                }
                Err(AgentError::Transition(err)) => {
                    warn!(error = %err, "Resolution rejected");
                }
                Err(err) => {
                    error!(position_id = %id, error = %err, "Resolution failed");
                    return Err(err);
                }
            }
        }

        let open = self.repository.open_positions().await?;
        for position in open.into_iter().filter(|p| p.category == category) {
            let id = position.id;

            match position.state {
                PositionState::Watching => {
                    if resumed_steps.contains(&(id.to_string(), TaskAction::PlaceOrder)) {
                        continue;
                    }
                    match self.lifecycle.enter(id, now).await {
                        Ok(_) => {}
                        Err(AgentError::Transition(err)) => {
                            warn!(error = %err, "Entry skipped");
                        }
                        Err(err) => return Err(err),
                    }
                }
                PositionState::Entered if !position.is_expired(now) => {
                    self.lifecycle.monitor(id, now).await?;
                }
                // Entered past expiry: resolution was rejected above, leave
                // it for the next cycle.
                _ => {}
            }
        }
        Ok(())
    }
}
