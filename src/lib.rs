//! Cross-venue prediction-market arbitrage agent.
//!
//! Detects complementary bets priced below a combined probability of one
//! across Polymarket and Kalshi, and manages each hit as a long-lived,
//! crash-recoverable position. The coordination core is an append-only task
//! journal, a bounded retry executor, a monotonic position state machine and
//! an adaptive per-category scheduler, driven by a single coordinator loop.

pub mod api;
pub mod arbitrage;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod market;
pub mod metrics;
pub mod performance;
pub mod position;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{AgentError, Result};
