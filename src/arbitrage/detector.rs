//! Pure arbitrage detection over complementary quote pairs.
//!
//! No side effects, no I/O: given two quotes the detector either produces an
//! `Opportunity` with its guaranteed profit and stake split, or nothing.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::market::{normalize_event_name, MarketCategory, Outcome, Quote};

/// A detected risk-free arbitrage across two venues.
///
/// Stakes are split so that payout is identical regardless of which outcome
/// wins: `stake / price` pays out `total / (price_a + price_b)` on either leg,
/// which exceeds the total stake exactly when the prices sum below one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    /// Event name from the first leg.
    pub event_name: String,
    /// Category derived from the event name.
    pub category: MarketCategory,
    /// First leg quote.
    pub quote_a: Quote,
    /// Second leg quote (opposite outcome, other venue).
    pub quote_b: Quote,
    /// Stake on the first leg.
    pub stake_a: Decimal,
    /// Stake on the second leg.
    pub stake_b: Decimal,
    /// Guaranteed profit as a fraction of total stake: `1 - price_a - price_b`.
    pub profit_fraction: Decimal,
    /// Earliest expiry across the two legs, if either venue reports one.
    pub expires_at: Option<OffsetDateTime>,
}

/// Decide whether a complementary quote pair is a risk-free arbitrage.
///
/// Fails closed: returns `None` when the quotes are not a cross-venue
/// complementary pair, when either price sits at 0 or 1 (a resolved market),
/// or when the prices sum to one or more.
pub fn detect(quote_a: &Quote, quote_b: &Quote, total_stake: Decimal) -> Option<Opportunity> {
    if quote_a.venue == quote_b.venue || quote_a.outcome != quote_b.outcome.opposite() {
        return None;
    }

    if !quote_a.is_actionable() || !quote_b.is_actionable() {
        return None;
    }

    let combined = quote_a.probability + quote_b.probability;
    if combined >= Decimal::ONE {
        return None;
    }

    if total_stake <= Decimal::ZERO {
        return None;
    }

    // Equal-payout split: stake_x / price_x is the same for both legs.
    let stake_a = total_stake * quote_a.probability / combined;
    let stake_b = total_stake * quote_b.probability / combined;
    let profit_fraction = Decimal::ONE - combined;

    let expires_at = match (quote_a.expires_at, quote_b.expires_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    Some(Opportunity {
        event_name: quote_a.event_name.clone(),
        category: MarketCategory::categorize(&quote_a.event_name),
        quote_a: quote_a.clone(),
        quote_b: quote_b.clone(),
        stake_a,
        stake_b,
        profit_fraction,
        expires_at,
    })
}

/// Cross-venue matching: pair quotes from two venues by normalized event name
/// and probe both directions (A-yes/B-no and A-no/B-yes), keeping the more
/// profitable direction per event.
pub fn find_opportunities(
    quotes_a: &[Quote],
    quotes_b: &[Quote],
    total_stake: Decimal,
) -> Vec<Opportunity> {
    let index_b = index_by_event(quotes_b);

    let mut opportunities = Vec::new();
    for (event, (a_yes, a_no)) in index_by_event(quotes_a) {
        let Some(&(b_yes, b_no)) = index_b.get(&event) else {
            continue;
        };

        let forward = pair(a_yes, b_no).and_then(|(a, b)| detect(a, b, total_stake));
        let reverse = pair(a_no, b_yes).and_then(|(a, b)| detect(a, b, total_stake));

        let best = match (forward, reverse) {
            (Some(f), Some(r)) => Some(if f.profit_fraction >= r.profit_fraction {
                f
            } else {
                r
            }),
            (f, r) => f.or(r),
        };

        if let Some(opp) = best {
            debug!(
                event = %opp.event_name,
                profit = %opp.profit_fraction,
                "Arbitrage opportunity detected"
            );
            opportunities.push(opp);
        }
    }

    opportunities
}

fn pair<'a>(a: Option<&'a Quote>, b: Option<&'a Quote>) -> Option<(&'a Quote, &'a Quote)> {
    Some((a?, b?))
}

/// Index quotes as (yes, no) per normalized event name. A later duplicate
/// quote for the same side wins; venues occasionally list an event twice.
fn index_by_event(quotes: &[Quote]) -> HashMap<String, (Option<&Quote>, Option<&Quote>)> {
    let mut index: HashMap<String, (Option<&Quote>, Option<&Quote>)> = HashMap::new();
    for quote in quotes {
        if quote.validate().is_err() {
            continue;
        }
        let slot = index
            .entry(normalize_event_name(&quote.event_name))
            .or_default();
        match quote.outcome {
            Outcome::Yes => slot.0 = Some(quote),
            Outcome::No => slot.1 = Some(quote),
        }
    }
    index
}
