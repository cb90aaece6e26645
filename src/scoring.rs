//! Signal scoring: combines structure, order flow, book imbalance, and
//! whale evidence into a pass/fail decision with a confidence score.

use crate::config::{Config, SegmentThresholds};
use crate::indicators::{adx, ema, rsi};
use crate::market::{Candle, MarketCapSegment, OrderBookSnapshot, TradeSide};
use crate::orderflow::{OrderFlow, WhaleTrade};
use crate::structure::{Direction, StructureView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    fn direction(&self) -> Direction {
        match self {
            Side::Long => Direction::Bullish,
            Side::Short => Direction::Bearish,
        }
    }

    fn trade_side(&self) -> TradeSide {
        match self {
            Side::Long => TradeSide::Buy,
            Side::Short => TradeSide::Sell,
        }
    }
}

/// One emitted alert. Built fresh each cycle and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Signal {
    pub symbol: String,
    pub side: Side,
    pub confidence: u8,
    pub last_close: f64,
    pub msb: bool,
    pub fvg_reject: bool,
    pub net_delta: f64,
    pub bid_notional: f64,
    pub ask_notional: f64,
    pub whale: Option<WhaleTrade>,
    pub segment: MarketCapSegment,
    // Momentum annotation for the alert line; not part of the decision.
    pub adx: Option<f64>,
    pub rsi: Option<f64>,
}

/// Scorer thresholds, split out of `Config` so tests can drive them directly.
#[derive(Debug, Clone, Copy)]
pub struct ScoreParams {
    pub book_ratio: f64,
    pub min_conditions: usize,
    pub max_level_distance: f64,
    pub whale_max_distance: f64,
    pub whale_max_age_ms: i64,
}

impl ScoreParams {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            book_ratio: cfg.book_ratio,
            min_conditions: cfg.min_conditions,
            max_level_distance: cfg.max_level_distance,
            whale_max_distance: cfg.whale_max_distance,
            whale_max_age_ms: cfg.whale_max_age_secs as i64 * 1000,
        }
    }
}

/// Score one side of one symbol. Returns `None` when the side lacks
/// structural evidence, fails a guard, or clears fewer than the minimum
/// condition count.
#[allow(clippy::too_many_arguments)]
pub fn score_side(
    symbol: &str,
    side: Side,
    candles: &[Candle],
    structure: &StructureView,
    flow: &OrderFlow,
    book: &OrderBookSnapshot,
    segment: MarketCapSegment,
    thresholds: &SegmentThresholds,
    params: &ScoreParams,
) -> Option<Signal> {
    let last = candles.last()?;
    let direction = side.direction();

    let (has_structure, msb, fvg_reject) = match side {
        Side::Long => (structure.long_evidence(), structure.bullish_msb, structure.bullish_fvg_reject),
        Side::Short => (structure.short_evidence(), structure.bearish_msb, structure.bearish_fvg_reject),
    };
    if !has_structure {
        return None;
    }

    let cond_delta = match side {
        Side::Long => flow.net_delta >= thresholds.net_delta_min,
        Side::Short => flow.net_delta <= -thresholds.net_delta_min,
    };
    let cond_book = match side {
        Side::Long => book.bid_notional >= book.ask_notional * params.book_ratio,
        Side::Short => book.ask_notional >= book.bid_notional * params.book_ratio,
    };
    let whale = flow.whale(side.trade_side());
    let cond_whale = whale.is_some();

    // Distance guard: a break that price has already run away from is stale.
    let level = structure.reference_level(direction)?;
    if (level - last.close).abs() / last.close > params.max_level_distance {
        return None;
    }

    // Whale guard: the qualifying print must be near the current price and
    // recent relative to the last bar.
    if let Some(w) = whale {
        if (w.price - last.close).abs() / last.close > params.whale_max_distance {
            return None;
        }
        if last.ts_ms - w.ts_ms > params.whale_max_age_ms {
            return None;
        }
    }

    let true_count = 1 + usize::from(cond_delta) + usize::from(cond_book) + usize::from(cond_whale);
    if true_count < params.min_conditions {
        return None;
    }

    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    Some(Signal {
        symbol: symbol.to_string(),
        side,
        confidence: (true_count as f64 / 4.0 * 100.0).round() as u8,
        last_close: last.close,
        msb,
        fvg_reject,
        net_delta: flow.net_delta,
        bid_notional: book.bid_notional,
        ask_notional: book.ask_notional,
        whale: whale.copied(),
        segment,
        adx: adx(&highs, &lows, &closes, 14),
        rsi: rsi(&closes, 14),
    })
}

/// Lower-timeframe trend confirmation: EMA20/EMA50 aligned with the side and
/// the last bar-over-bar move still bounded (the entry is not chased).
pub fn trend_confirms(closes: &[f64], side: Side, max_recent_change_pct: f64) -> bool {
    let n = closes.len();
    if n < 51 {
        return false;
    }
    let (fast, slow) = match (ema(closes, 20), ema(closes, 50)) {
        (Some(f), Some(s)) => (f, s),
        _ => return false,
    };
    let prev = closes[n - 2];
    if prev <= 0.0 {
        return false;
    }
    let change_pct = (closes[n - 1] / prev - 1.0) * 100.0;
    if change_pct.abs() > max_recent_change_pct {
        return false;
    }
    match side {
        Side::Long => fast > slow,
        Side::Short => fast < slow,
    }
}

/// Broad-market regime of a reference instrument, used to veto countertrend
/// shorts during a wide uptrend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Bullish,
    Bearish,
    Neutral,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Bullish => "bullish",
            Regime::Bearish => "bearish",
            Regime::Neutral => "neutral",
        }
    }
}

pub fn classify_regime(closes: &[f64]) -> Regime {
    let (fast, slow, strength) = match (ema(closes, 20), ema(closes, 50), rsi(closes, 14)) {
        (Some(f), Some(s), Some(r)) => (f, s, r),
        _ => return Regime::Neutral,
    };
    if fast > slow && strength > 50.0 {
        Regime::Bullish
    } else if fast < slow && strength < 50.0 {
        Regime::Bearish
    } else {
        Regime::Neutral
    }
}
