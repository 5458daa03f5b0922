//! Position model: a tracked arbitrage bet from detection to resolution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::arbitrage::Opportunity;
use crate::market::{normalize_event_name, MarketCategory, Outcome, Venue};

/// Lifecycle state of a position. Transitions are monotonic: forward only,
/// never out of a terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PositionState {
    /// Detected, orders not yet placed.
    Watching,
    /// Simulated orders placed; monitored until expiry.
    Entered,
    /// Resolved at expiry with no settlement signal; profit realized as
    /// targeted, by construction of the equal-payout stakes.
    Expired,
    /// Settlement confirmed a positive realized profit.
    Profitable,
    /// Settlement contradicted the expected payout (e.g. venue default).
    Loss,
}

impl PositionState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PositionState::Expired | PositionState::Profitable | PositionState::Loss
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: PositionState) -> bool {
        match (self, next) {
            (PositionState::Watching, PositionState::Entered) => true,
            (
                PositionState::Entered,
                PositionState::Expired | PositionState::Profitable | PositionState::Loss,
            ) => true,
            _ => false,
        }
    }
}

/// Identity of an open opportunity: one open position per triple at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    /// Normalized event name.
    pub event_name: String,
    /// First-leg venue.
    pub venue_a: Venue,
    /// Second-leg venue.
    pub venue_b: Venue,
}

/// A tracked arbitrage position spanning both venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Unique id, generated at creation.
    pub id: Uuid,
    /// Event name as reported by the first leg.
    pub event_name: String,
    /// Category derived from the event name.
    pub category: MarketCategory,
    /// First-leg venue.
    pub venue_a: Venue,
    /// Second-leg venue.
    pub venue_b: Venue,
    /// First-leg outcome side.
    pub outcome_a: Outcome,
    /// Second-leg outcome side.
    pub outcome_b: Outcome,
    /// First-leg entry probability.
    pub price_a: Decimal,
    /// Second-leg entry probability.
    pub price_b: Decimal,
    /// First-leg stake.
    pub stake_a: Decimal,
    /// Second-leg stake.
    pub stake_b: Decimal,
    /// Guaranteed profit fraction computed at detection: `1 - price_a - price_b`.
    pub target_profit: Decimal,
    /// Current lifecycle state.
    pub state: PositionState,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last monitor-scan time.
    #[serde(with = "time::serde::rfc3339")]
    pub last_checked_at: OffsetDateTime,
    /// When the underlying markets settle.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// Realized profit fraction; set at resolution.
    pub actual_profit: Option<Decimal>,
    /// Resolution time; set once, on entering a terminal state.
    #[serde(with = "time::serde::rfc3339::option")]
    pub resolved_at: Option<OffsetDateTime>,
}

impl Position {
    /// Build a `watching` position from a detected opportunity. When neither
    /// venue reports an expiry, `default_expiry_days` applies.
    pub fn from_opportunity(
        opportunity: &Opportunity,
        now: OffsetDateTime,
        default_expiry_days: i64,
    ) -> Self {
        let expires_at = opportunity
            .expires_at
            .unwrap_or(now + time::Duration::days(default_expiry_days));

        Self {
            id: Uuid::new_v4(),
            event_name: opportunity.event_name.clone(),
            category: opportunity.category,
            venue_a: opportunity.quote_a.venue,
            venue_b: opportunity.quote_b.venue,
            outcome_a: opportunity.quote_a.outcome,
            outcome_b: opportunity.quote_b.outcome,
            price_a: opportunity.quote_a.probability,
            price_b: opportunity.quote_b.probability,
            stake_a: opportunity.stake_a,
            stake_b: opportunity.stake_b,
            target_profit: opportunity.profit_fraction,
            state: PositionState::Watching,
            created_at: now,
            last_checked_at: now,
            expires_at,
            actual_profit: None,
            resolved_at: None,
        }
    }

    /// Identity triple for duplicate-open suppression.
    pub fn key(&self) -> PositionKey {
        PositionKey {
            event_name: normalize_event_name(&self.event_name),
            venue_a: self.venue_a,
            venue_b: self.venue_b,
        }
    }

    /// Whether the position is still in a non-terminal state.
    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Whole days between creation and the last check. Derived, never stored.
    pub fn days_held(&self) -> i64 {
        (self.last_checked_at - self.created_at).whole_days()
    }

    /// Whether the position is due for resolution.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Quote;
    use rust_decimal_macros::dec;
    use time::Duration;

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

    #[test]
    fn transitions_are_monotonic() {
        use PositionState::*;

        assert!(Watching.can_transition_to(Entered));
        assert!(Entered.can_transition_to(Expired));
        assert!(Entered.can_transition_to(Profitable));
        assert!(Entered.can_transition_to(Loss));

        assert!(!Entered.can_transition_to(Watching));
        assert!(!Watching.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Entered));
        assert!(!Profitable.can_transition_to(Loss));
    }

    #[test]
    fn terminal_states() {
        assert!(!PositionState::Watching.is_terminal());
        assert!(!PositionState::Entered.is_terminal());
        assert!(PositionState::Expired.is_terminal());
        assert!(PositionState::Profitable.is_terminal());
        assert!(PositionState::Loss.is_terminal());
    }

    #[test]
    fn from_opportunity_starts_watching_with_default_expiry() {
        let now = OffsetDateTime::now_utc();
        let position = Position::from_opportunity(&opportunity(), now, 30);

        assert_eq!(position.state, PositionState::Watching);
        assert_eq!(position.target_profit, dec!(0.03));
        assert_eq!(position.expires_at, now + Duration::days(30));
        assert!(position.actual_profit.is_none());
        assert!(position.is_open());
    }

    #[test]
    fn days_held_derived_from_timestamps() {
        let now = OffsetDateTime::now_utc();
        let mut position = Position::from_opportunity(&opportunity(), now, 30);
        assert_eq!(position.days_held(), 0);

        position.last_checked_at = now + Duration::days(3) + Duration::hours(5);
        assert_eq!(position.days_held(), 3);
    }

    #[test]
    fn key_normalizes_event_name() {
        let now = OffsetDateTime::now_utc();
        let position = Position::from_opportunity(&opportunity(), now, 30);
        assert_eq!(
            position.key().event_name,
            "will bitcoin reach $150k by end of 2026?"
        );
    }
}
