//! Kalshi quote-fetch client.
//!
//! Read-only: fetches open markets from the public trade API. Kalshi quotes
//! prices in cents; they are normalized to probabilities and the yes/no pair
//! is renormalized to sum to one.

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

/// Kalshi trade API client.
#[derive(Debug, Clone)]
pub struct KalshiSource {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL for the trade API.
    base_url: String,
    /// Markets requested per fetch.
    page_limit: usize,
}

/// Markets envelope from the trade API.
#[derive(Debug, Clone, Deserialize)]
struct MarketsResponse {
    /// Market list.
    markets: Option<Vec<KalshiMarket>>,
}

/// One market from the trade API.
#[derive(Debug, Clone, Deserialize)]
struct KalshiMarket {
    /// Market ticker (identifier).
    ticker: Option<String>,
    /// Market title (event name).
    title: Option<String>,
    /// Best yes bid, in cents.
    yes_bid: Option<Decimal>,
    /// Best no bid, in cents.
    no_bid: Option<Decimal>,
    /// Close time (RFC 3339).
    close_time: Option<String>,
}

impl KalshiSource {
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
            base_url: config.kalshi_api_url.clone(),
            page_limit: 200,
        }
    }

    fn transient(&self, reason: impl Into<String>) -> FetchError {
        FetchError::Transient {
            venue: Venue::Kalshi,
            reason: reason.into(),
        }
    }

    /// Normalize a cent price into a probability.
    fn to_probability(price: Decimal) -> Decimal {
        if price > Decimal::ONE {
            price / Decimal::ONE_HUNDRED
        } else {
            price
        }
    }

    /// Convert one market into yes/no quotes, if priced.
    fn convert(&self, market: KalshiMarket, now: OffsetDateTime) -> Option<Vec<Quote>> {
        let market_id = market.ticker?;
        let event_name = market.title.filter(|t| !t.trim().is_empty())?;

        let yes = Self::to_probability(market.yes_bid?);
        let no = Self::to_probability(market.no_bid?);

        // Renormalize so the pair sums to one; bids rarely do exactly.
        let total = yes + no;
        if total <= Decimal::ZERO {
            return None;
        }
        let yes = yes / total;
        let no = no / total;

        let expires_at = market
            .close_time
            .as_deref()
            .and_then(|d| OffsetDateTime::parse(d, &Rfc3339).ok());

        Some(vec![
            Quote {
                venue: Venue::Kalshi,
                market_id: market_id.clone(),
                event_name: event_name.clone(),
                outcome: Outcome::Yes,
                probability: yes,
                expires_at,
                observed_at: now,
            },
            Quote {
                venue: Venue::Kalshi,
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
impl PriceSource for KalshiSource {
    fn venue(&self) -> Venue {
        Venue::Kalshi
    }

    #[instrument(skip(self), fields(venue = "kalshi", category = %category))]
    async fn fetch(&self, category: MarketCategory) -> Result<Vec<Quote>, FetchError> {
        let url = format!("{}/markets", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("limit", self.page_limit.to_string()),
                ("status", "open".to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.transient(format!("HTTP {}", response.status())));
        }

        let envelope: MarketsResponse = response
            .json()
            .await
            .map_err(|e| self.transient(format!("failed to parse markets: {}", e)))?;

        let now = OffsetDateTime::now_utc();
        let quotes: Vec<Quote> = envelope
            .markets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| self.convert(m, now))
            .flatten()
            .filter(|q| MarketCategory::categorize(&q.event_name) == category)
            .collect();

        if quotes.is_empty() {
            warn!(category = %category, "No kalshi quotes for category");
        } else {
            debug!(count = quotes.len(), "Fetched kalshi quotes");
        }

        Ok(quotes)
    }
}
