use anyhow::Result;
use async_trait::async_trait;

use crate::market::{Candle, MarketCapSegment, OrderBookSnapshot, Trade};

pub mod okx;
pub mod retry;

/// Read-only market data source. The scanner never talks to a venue
/// directly; everything flows through this trait so tests can substitute
/// fixtures.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Scan universe, ordered by 24h quote volume, largest first.
    async fn list_instruments(&self) -> Result<Vec<String>>;

    /// Chronological candles, oldest first.
    async fn candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Recent tape entries; `max_age_secs` of 0 disables the age filter.
    async fn recent_trades(&self, symbol: &str, limit: usize, max_age_secs: u64) -> Result<Vec<Trade>>;

    async fn order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot>;

    async fn market_cap_segment(&self, symbol: &str) -> Result<MarketCapSegment>;
}

/// Outbound alert channel. Best-effort: a failed delivery is logged by the
/// caller and never aborts the scan.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}
