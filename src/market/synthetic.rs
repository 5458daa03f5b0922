//! Synthetic price sources for demo mode and testing.
//!
//! `SyntheticSource` generates plausible 2026-2028 event prices with a
//! configurable transient-failure probability, selected by `--dummy`. It
//! conforms to the same fetch capability as the live venues, so the rest
//! of the pipeline is unchanged. `ScriptedSource` replays a fixed queue of
//! outcomes for deterministic tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::error::FetchError;

use super::source::PriceSource;
use super::types::{MarketCategory, Outcome, Quote, Venue};

const POLITICS_EVENTS: &[&str] = &[
    "Will the Republican Party win control of the Senate in 2026 midterms?",
    "Will the House flip to Democratic control in 2026?",
    "Will a woman be elected President in 2028?",
    "Will there be a contested 2028 Presidential Election?",
];

const SPORTS_EVENTS: &[&str] = &[
    "Will the Warriors win the 2026 NBA Championship?",
    "Will the Chiefs win the 2027 Super Bowl?",
    "Will a European team win the 2026 World Cup?",
    "Will the Lakers make the 2026 NBA Finals?",
];

const CRYPTO_EVENTS: &[&str] = &[
    "Will Bitcoin reach $150k by end of 2026?",
    "Will Ethereum reach $10k by end of 2026?",
];

const ECONOMICS_EVENTS: &[&str] = &[
    "Will the Fed cut rates below 3% by end of 2026?",
    "Will there be a recession in 2026?",
    "Will gold reach $3000/oz by end of 2026?",
];

const TECH_EVENTS: &[&str] = &[
    "Will OpenAI release GPT-6 by Q3 2027?",
    "Will SpaceX successfully land on Mars by 2027?",
    "Will quantum computing achieve commercial viability by 2027?",
];

fn events_for(category: MarketCategory) -> &'static [&'static str] {
    match category {
        MarketCategory::Politics => POLITICS_EVENTS,
        MarketCategory::Sports => SPORTS_EVENTS,
        MarketCategory::Crypto => CRYPTO_EVENTS,
        MarketCategory::Economics => ECONOMICS_EVENTS,
        MarketCategory::Tech => TECH_EVENTS,
        MarketCategory::Other => &[],
    }
}

/// Configuration for the synthetic source.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Probability that a fetch fails transiently, in [0, 1].
    pub fault_rate: f64,
    /// Days until synthetic markets expire.
    pub expiry_days: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            fault_rate: 0.10,
            expiry_days: 30,
        }
    }
}

/// Fault-injecting synthetic price source for one venue.
///
/// Prices are a deterministic function of the event name, so two instances
/// (one per venue) produce coordinated books: the Kalshi yes-price sits a
/// profit spread above the Polymarket one, which makes the Polymarket-yes /
/// Kalshi-no pair a guaranteed arbitrage with that spread as its profit.
/// Spreads cycle through high (>3%), medium (1-3%) and low (<1%) bands.
#[derive(Debug)]
pub struct SyntheticSource {
    venue: Venue,
    config: SyntheticConfig,
}

impl SyntheticSource {
    /// Create a synthetic source for a venue.
    pub fn new(venue: Venue, config: SyntheticConfig) -> Self {
        Self { venue, config }
    }

    /// Base yes-probability in [0.35, 0.55), derived from the event name.
    fn base_probability(event_name: &str) -> Decimal {
        let hash: u32 = event_name.bytes().map(u32::from).sum();
        Decimal::new(3500 + i64::from(hash % 2000), 4)
    }

    /// Guaranteed profit spread for an event, cycling through bands.
    fn profit_spread(event_name: &str) -> Decimal {
        match event_name.len() % 3 {
            0 => Decimal::new(4, 2),  // high: 4%
            1 => Decimal::new(2, 2),  // medium: 2%
            _ => Decimal::new(5, 3),  // low: 0.5%
        }
    }

    fn yes_probability(&self, event_name: &str) -> Decimal {
        let base = Self::base_probability(event_name);
        match self.venue {
            Venue::Polymarket => base,
            Venue::Kalshi => base + Self::profit_spread(event_name),
        }
    }
}

#[async_trait]
impl PriceSource for SyntheticSource {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn fetch(&self, category: MarketCategory) -> Result<Vec<Quote>, FetchError> {
        let mut rng = rand::thread_rng();

        if rng.gen::<f64>() < self.config.fault_rate {
            return Err(FetchError::Transient {
                venue: self.venue,
                reason: "simulated API failure".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = Some(now + Duration::days(self.config.expiry_days));

        let mut quotes = Vec::new();
        for (i, event_name) in events_for(category).iter().enumerate() {
            let yes = self.yes_probability(event_name);
            let no = Decimal::ONE - yes;
            let market_id = format!("{}_{}_{}", self.venue, category, i);

            for (outcome, probability) in [(Outcome::Yes, yes), (Outcome::No, no)] {
                quotes.push(Quote {
                    venue: self.venue,
                    market_id: market_id.clone(),
                    event_name: event_name.to_string(),
                    outcome,
                    probability,
                    expires_at,
                    observed_at: now,
                });
            }
        }

        debug!(venue = %self.venue, category = %category, count = quotes.len(), "Generated synthetic quotes");
        Ok(quotes)
    }
}

/// Scripted source that replays a fixed queue of fetch outcomes.
/// Once the queue is empty, every fetch fails.
pub struct ScriptedSource {
    venue: Venue,
    outcomes: Mutex<VecDeque<Result<Vec<Quote>, FetchError>>>,
}

impl ScriptedSource {
    /// Create a scripted source for a venue.
    pub fn new(venue: Venue) -> Self {
        Self {
            venue,
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a successful fetch returning these quotes.
    pub fn push_quotes(&self, quotes: Vec<Quote>) {
        self.outcomes.lock().unwrap().push_back(Ok(quotes));
    }

    /// Queue a transient failure.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.outcomes.lock().unwrap().push_back(Err(FetchError::Transient {
            venue: self.venue,
            reason: reason.into(),
        }));
    }

    /// Number of outcomes remaining in the queue.
    pub fn remaining(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn fetch(&self, _category: MarketCategory) -> Result<Vec<Quote>, FetchError> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(FetchError::Transient {
                    venue: self.venue,
                    reason: "scripted queue exhausted".to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn synthetic_source_produces_complementary_pairs() {
        let source = SyntheticSource::new(
            Venue::Polymarket,
            SyntheticConfig {
                fault_rate: 0.0,
                expiry_days: 30,
            },
        );

        let quotes = source.fetch(MarketCategory::Sports).await.unwrap();

        assert_eq!(quotes.len(), SPORTS_EVENTS.len() * 2);
        for pair in quotes.chunks(2) {
            assert_eq!(pair[0].event_name, pair[1].event_name);
            assert_eq!(pair[0].probability + pair[1].probability, dec!(1));
            assert!(pair[0].validate().is_ok());
        }
    }

    #[tokio::test]
    async fn venues_are_coordinated_into_guaranteed_arbs() {
        let config = SyntheticConfig {
            fault_rate: 0.0,
            expiry_days: 30,
        };
        let pm = SyntheticSource::new(Venue::Polymarket, config.clone());
        let k = SyntheticSource::new(Venue::Kalshi, config);

        let pm_quotes = pm.fetch(MarketCategory::Politics).await.unwrap();
        let k_quotes = k.fetch(MarketCategory::Politics).await.unwrap();

        for (pm_pair, k_pair) in pm_quotes.chunks(2).zip(k_quotes.chunks(2)) {
            let pm_yes = &pm_pair[0];
            let k_no = &k_pair[1];
            let spread = SyntheticSource::profit_spread(&pm_yes.event_name);
            // pm-yes + kalshi-no sums to exactly one minus the spread.
            assert_eq!(pm_yes.probability + k_no.probability, dec!(1) - spread);
        }
    }

    #[tokio::test]
    async fn synthetic_source_always_fails_at_full_fault_rate() {
        let source = SyntheticSource::new(
            Venue::Kalshi,
            SyntheticConfig {
                fault_rate: 1.0,
                expiry_days: 30,
            },
        );

        let result = source.fetch(MarketCategory::Crypto).await;
        assert!(matches!(result, Err(FetchError::Transient { .. })));
    }

    #[tokio::test]
    async fn scripted_source_replays_in_order() {
        let source = ScriptedSource::new(Venue::Polymarket);
        source.push_failure("first");
        source.push_quotes(vec![]);

        assert!(source.fetch(MarketCategory::Other).await.is_err());
        assert!(source.fetch(MarketCategory::Other).await.is_ok());
        // Queue exhausted: fails again
        assert!(source.fetch(MarketCategory::Other).await.is_err());
    }
}
