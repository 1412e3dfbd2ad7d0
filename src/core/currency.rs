//! Currency conversion abstractions

use anyhow::Result;
use async_trait::async_trait;

/// Converts amounts between currency codes.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Units of `to` per unit of `from`.
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}
