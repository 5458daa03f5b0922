//! Core market types: venues, outcomes, categories and quotes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::OffsetDateTime;

use crate::error::ValidationError;

/// A prediction market venue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Venue {
    /// Polymarket CLOB/gamma markets.
    Polymarket,
    /// Kalshi exchange markets.
    Kalshi,
}

/// Binary market outcome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// YES side of the binary market.
    #[strum(serialize = "yes", serialize = "YES")]
    #[default]
    Yes,
    /// NO side of the binary market.
    #[strum(serialize = "no", serialize = "NO")]
    No,
}

impl Outcome {
    /// Get the complementary outcome.
    pub fn opposite(&self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

/// Coarse market classification used to bucket performance and scheduling.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarketCategory {
    /// Elections, legislation, political control.
    Politics,
    /// Leagues, championships, tournaments.
    Sports,
    /// Cryptocurrency price and adoption markets.
    Crypto,
    /// Rates, inflation, indices, recessions.
    Economics,
    /// AI, hardware, space, big-tech milestones.
    Tech,
    /// Anything that matches no known keyword.
    Other,
}

impl MarketCategory {
    const POLITICS_KEYWORDS: &'static [&'static str] = &[
        "election",
        "president",
        "senate",
        "house",
        "republican",
        "democratic",
        "midterm",
    ];

    const SPORTS_KEYWORDS: &'static [&'static str] = &[
        "nba",
        "nfl",
        "super bowl",
        "championship",
        "world cup",
        "warriors",
        "lakers",
        "chiefs",
    ];

    const CRYPTO_KEYWORDS: &'static [&'static str] =
        &["bitcoin", "ethereum", "crypto", "blockchain"];

    const ECONOMICS_KEYWORDS: &'static [&'static str] = &[
        "fed",
        "rate",
        "recession",
        "inflation",
        "unemployment",
        "s&p",
        "gold",
        "dollar",
    ];

    const TECH_KEYWORDS: &'static [&'static str] = &[
        "ai", "gpt", "openai", "tesla", "apple", "google", "amazon", "spacex", "quantum",
    ];

    /// Classify an event by keywords in its name.
    pub fn categorize(event_name: &str) -> Self {
        let lower = event_name.to_lowercase();
        let contains_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

        if contains_any(Self::POLITICS_KEYWORDS) {
            MarketCategory::Politics
        } else if contains_any(Self::SPORTS_KEYWORDS) {
            MarketCategory::Sports
        } else if contains_any(Self::CRYPTO_KEYWORDS) {
            MarketCategory::Crypto
        } else if contains_any(Self::ECONOMICS_KEYWORDS) {
            MarketCategory::Economics
        } else if contains_any(Self::TECH_KEYWORDS) {
            MarketCategory::Tech
        } else {
            MarketCategory::Other
        }
    }
}

/// Normalize an event name for cross-venue matching.
pub fn normalize_event_name(name: &str) -> String {
    name.to_lowercase()
        .trim()
        .replace(['\'', '"'], "")
}

/// An immutable price observation for one outcome at one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Venue the quote was observed at.
    pub venue: Venue,
    /// Venue-local market identifier.
    pub market_id: String,
    /// Human-readable event name.
    pub event_name: String,
    /// Which side of the binary market this quote prices.
    pub outcome: Outcome,
    /// Implied probability in [0, 1].
    pub probability: Decimal,
    /// When the market settles, if the venue reports it.
    pub expires_at: Option<OffsetDateTime>,
    /// When the quote was fetched.
    pub observed_at: OffsetDateTime,
}

impl Quote {
    /// Check the quote is well-formed. Quotes that fail validation are
    /// discarded and journaled; detection for their pair is skipped.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_name.trim().is_empty() {
            return Err(ValidationError::MissingEventName { venue: self.venue });
        }

        if self.probability < Decimal::ZERO || self.probability > Decimal::ONE {
            return Err(ValidationError::ProbabilityOutOfRange {
                venue: self.venue,
                event_name: self.event_name.clone(),
                probability: self.probability,
            });
        }

        Ok(())
    }

    /// Whether the price is actionable for arbitrage. A resolved market
    /// (price pinned at 0 or 1) never is.
    pub fn is_actionable(&self) -> bool {
        self.probability > Decimal::ZERO && self.probability < Decimal::ONE
    }
}
