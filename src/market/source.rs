//! The price source capability: "fetch current quotes for venue V".

use async_trait::async_trait;

use crate::error::FetchError;

use super::types::{MarketCategory, Quote, Venue};

/// Capability to fetch current quotes from one venue. The coordinator
/// depends only on this trait; live venue clients and the synthetic
/// fault-injecting source all implement it.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Venue this source fetches from.
    fn venue(&self) -> Venue;

    /// Fetch current quotes for a category. May fail transiently; the
    /// retry executor wraps every call.
    async fn fetch(&self, category: MarketCategory) -> Result<Vec<Quote>, FetchError>;
}
