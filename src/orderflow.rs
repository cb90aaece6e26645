//! Order-flow classification: net notional delta and tiered whale trades.

use crate::config::SegmentThresholds;
use crate::market::{Trade, TradeSide};

/// Notional size tier of a whale trade. `X` is the largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WhaleTier {
    S,
    M,
    X,
}

impl WhaleTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhaleTier::S => "S",
            WhaleTier::M => "M",
            WhaleTier::X => "X",
        }
    }

    fn classify(notional: f64, th: &SegmentThresholds) -> Option<Self> {
        if notional >= th.whale_x {
            Some(WhaleTier::X)
        } else if notional >= th.whale_m {
            Some(WhaleTier::M)
        } else if notional >= th.whale_s {
            Some(WhaleTier::S)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WhaleTrade {
    pub price: f64,
    pub size: f64,
    pub notional: f64,
    pub tier: WhaleTier,
    pub ts_ms: i64,
}

/// Aggregate read of a trade window. Per side only the single largest
/// qualifying trade survives; ties resolve by notional magnitude alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFlow {
    pub buy_notional: f64,
    pub sell_notional: f64,
    pub net_delta: f64,
    pub buy_whale: Option<WhaleTrade>,
    pub sell_whale: Option<WhaleTrade>,
}

impl OrderFlow {
    pub fn whale(&self, side: TradeSide) -> Option<&WhaleTrade> {
        match side {
            TradeSide::Buy => self.buy_whale.as_ref(),
            TradeSide::Sell => self.sell_whale.as_ref(),
        }
    }
}

pub fn classify(trades: &[Trade], th: &SegmentThresholds) -> OrderFlow {
    let mut flow = OrderFlow::default();
    for trade in trades {
        let notional = trade.notional();
        let slot = match trade.side {
            TradeSide::Buy => {
                flow.buy_notional += notional;
                &mut flow.buy_whale
            }
            TradeSide::Sell => {
                flow.sell_notional += notional;
                &mut flow.sell_whale
            }
        };
        if let Some(tier) = WhaleTier::classify(notional, th) {
            let larger = slot.map(|w| notional > w.notional).unwrap_or(true);
            if larger {
                *slot = Some(WhaleTrade {
                    price: trade.price,
                    size: trade.size,
                    notional,
                    tier,
                    ts_ms: trade.ts_ms,
                });
            }
        }
    }
    flow.net_delta = flow.buy_notional - flow.sell_notional;
    flow
}
