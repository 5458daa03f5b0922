//! Market data: venue clients, quote types and the price source trait.

pub mod kalshi;
pub mod polymarket;
pub mod source;
pub mod synthetic;
pub mod types;

pub use kalshi::KalshiSource;
pub use polymarket::PolymarketSource;
pub use source::PriceSource;
pub use synthetic::{ScriptedSource, SyntheticConfig, SyntheticSource};
pub use types::{normalize_event_name, MarketCategory, Outcome, Quote, Venue};
