//! Polymarket quote-fetch client.
//!
//! Read-only: fetches market prices from the gamma API. No authentication
//! and no order placement.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::FetchError;

use super::source::PriceSource;
use super::types::{MarketCategory, Outcome, Quote, Venue};

/// Polymarket gamma API client.
#[derive(Debug, Clone)]
pub struct PolymarketSource {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL for the gamma API.
    base_url: String,
    /// Markets requested per fetch.
    page_limit: usize,
}

/// Market data from the gamma API.
#[derive(Debug, Clone, Deserialize)]
struct GammaMarket {
    /// Market identifier.
    id: Option<String>,
    /// Market question text.
    question: Option<String>,
    /// Outcome prices as a JSON-encoded string array, e.g. `"[\"0.45\",\"0.55\"]"`.
    #[serde(rename = "outcomePrices")]
    outcome_prices: Option<String>,
    /// End date (RFC 3339).
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    /// Whether the market is active.
    active: Option<bool>,
    /// Whether the market is closed.
    closed: Option<bool>,
    /// Whether the market is archived.
    archived: Option<bool>,
}

impl PolymarketSource {
    /// Create a new client from config with tuned HTTP settings.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(2_000))
            .tcp_nodelay(true)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            base_url: config.polymarket_api_url.clone(),
            page_limit: 200,
        }
    }

    fn transient(&self, reason: impl Into<String>) -> FetchError {
        FetchError::Transient {
            venue: Venue::Polymarket,
            reason: reason.into(),
        }
    }

    /// Convert one gamma market into yes/no quotes, if tradeable.
    fn convert(&self, market: GammaMarket, now: OffsetDateTime) -> Option<Vec<Quote>> {
        if !market.active.unwrap_or(false)
            || market.closed.unwrap_or(false)
            || market.archived.unwrap_or(false)
        {
            return None;
        }

        let market_id = market.id?;
        let event_name = market.question?;

        // Gamma encodes prices as a JSON string inside the JSON payload.
        let prices: Vec<String> = serde_json::from_str(market.outcome_prices.as_deref()?).ok()?;
        let yes: Decimal = prices.first()?.parse().ok()?;
        let no: Decimal = prices.get(1)?.parse().ok()?;

        let expires_at = market
            .end_date
            .as_deref()
            .and_then(|d| OffsetDateTime::parse(d, &Rfc3339).ok());

        Some(vec![
            Quote {
                venue: Venue::Polymarket,
                market_id: market_id.clone(),
                event_name: event_name.clone(),
                outcome: Outcome::Yes,
                probability: yes,
                expires_at,
                observed_at: now,
            },
            Quote {
                venue: Venue::Polymarket,
                market_id,
                event_name,
                outcome: Outcome::No,
                probability: no,
                expires_at,
                observed_at: now,
            },
        ])
    }
}

#[async_trait]
impl PriceSource for PolymarketSource {
    fn venue(&self) -> Venue {
        Venue::Polymarket
    }

    #[instrument(skip(self), fields(venue = "polymarket", category = %category))]
    async fn fetch(&self, category: MarketCategory) -> Result<Vec<Quote>, FetchError> {
        let url = format!("{}/markets", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("active", "true".to_string()),
                ("limit", self.page_limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.transient(format!("HTTP {}", response.status())));
        }

        let markets: Vec<GammaMarket> = response
            .json()
            .await
            .map_err(|e| self.transient(format!("failed to parse markets: {}", e)))?;

        let now = OffsetDateTime::now_utc();
        let quotes: Vec<Quote> = markets
            .into_iter()
            .filter_map(|m| self.convert(m, now))
            .flatten()
            .filter(|q| MarketCategory::categorize(&q.event_name) == category)
            .collect();

        if quotes.is_empty() {
            warn!(category = %category, "No polymarket quotes for category");
        } else {
            debug!(count = quotes.len(), "Fetched polymarket quotes");
        }

        Ok(quotes)
    }
}
