use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Candle {
    pub ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy)]
pub struct Trade {
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
    pub ts_ms: i64,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.price * self.size.abs()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderBookSnapshot {
    pub bid_notional: f64,
    pub ask_notional: f64,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
}

/// Market-capitalization bucket used to scale whale and delta thresholds so
/// small-cap and large-cap instruments are judged on comparable relative
/// terms. Instruments with no known cap land in `Micro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketCapSegment {
    High,
    Mid,
    Low,
    Micro,
}

impl MarketCapSegment {
    const HIGH_CAP: f64 = 10_000_000_000.0;
    const MID_CAP: f64 = 1_000_000_000.0;
    const LOW_CAP: f64 = 100_000_000.0;

    pub fn from_cap(market_cap_usd: Option<f64>) -> Self {
        match market_cap_usd {
            Some(cap) if cap >= Self::HIGH_CAP => MarketCapSegment::High,
            Some(cap) if cap >= Self::MID_CAP => MarketCapSegment::Mid,
            Some(cap) if cap >= Self::LOW_CAP => MarketCapSegment::Low,
            _ => MarketCapSegment::Micro,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCapSegment::High => "high",
            MarketCapSegment::Mid => "mid",
            MarketCapSegment::Low => "low",
            MarketCapSegment::Micro => "micro",
        }
    }
}
