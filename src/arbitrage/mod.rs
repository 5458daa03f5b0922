//! Arbitrage opportunity detection.

pub mod detector;

pub use detector::{detect, find_opportunities, Opportunity};
