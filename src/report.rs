//! Alert message assembly: one Markdown digest per scan.

use chrono::Utc;

use crate::indicators::ema;
use crate::market::Candle;
use crate::orderflow::{OrderFlow, WhaleTier};
use crate::scoring::{Side, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Sideways,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Momentum {
    Positive,
    Negative,
    Flat,
    Unknown,
}

/// Condensed read of a reference instrument (BTC, ETH) for the digest
/// header. Trend compares the last close against EMA200 with a 1% band;
/// momentum is the sign of the EMA12/EMA26 spread.
#[derive(Debug, Clone)]
pub struct MarketSummary {
    pub symbol: String,
    pub last: f64,
    pub trend: Trend,
    pub momentum: Momentum,
    pub flow: Option<OrderFlow>,
}

pub fn summarize_reference(symbol: &str, candles: &[Candle], flow: Option<OrderFlow>) -> Option<MarketSummary> {
    if candles.len() < 50 {
        return None;
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let last = *closes.last()?;

    let trend = match ema(&closes, 200) {
        Some(e200) if last > e200 * 1.01 => Trend::Up,
        Some(e200) if last < e200 * 0.99 => Trend::Down,
        Some(_) => Trend::Sideways,
        None => Trend::Unknown,
    };
    let momentum = match (ema(&closes, 12), ema(&closes, 26)) {
        (Some(fast), Some(slow)) if fast > slow => Momentum::Positive,
        (Some(fast), Some(slow)) if fast < slow => Momentum::Negative,
        (Some(_), Some(_)) => Momentum::Flat,
        _ => Momentum::Unknown,
    };

    Some(MarketSummary {
        symbol: symbol.to_string(),
        last,
        trend,
        momentum,
        flow,
    })
}

impl Trend {
    fn label(&self) -> &'static str {
        match self {
            Trend::Up => "Up",
            Trend::Down => "Down",
            Trend::Sideways => "Sideways",
            Trend::Unknown => "Insufficient data",
        }
    }
}

impl Momentum {
    fn label(&self) -> &'static str {
        match self {
            Momentum::Positive => "Positive",
            Momentum::Negative => "Negative",
            Momentum::Flat => "Flat",
            Momentum::Unknown => "Unknown",
        }
    }
}

fn momentum_note(signal: &Signal) -> Option<String> {
    let adx = signal.adx?;
    let rsi = signal.rsi?;
    let tag = if adx >= 20.0 {
        "Strong"
    } else if adx >= 10.0 {
        "Moderate"
    } else {
        "Weak"
    };
    Some(format!("{} (ADX:{:.0}, RSI:{:.1})", tag, adx, rsi))
}

fn structure_label(signal: &Signal) -> String {
    let mut parts = Vec::new();
    match signal.side {
        Side::Long => {
            if signal.msb {
                parts.push("Bullish MSB");
            }
            if signal.fvg_reject {
                parts.push("Bullish FVG retest");
            }
        }
        Side::Short => {
            if signal.msb {
                parts.push("Bearish MSB");
            }
            if signal.fvg_reject {
                parts.push("Bearish FVG retest");
            }
        }
    }
    if parts.is_empty() {
        "n/a".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn build_message(
    timeframe: &str,
    universe_size: usize,
    references: &[MarketSummary],
    signals: &[Signal],
) -> String {
    let mut lines = Vec::new();
    lines.push(format!("*Market scan ({} candles)*", timeframe));

    for info in references {
        lines.push(format!("\n*{}*", info.symbol));
        lines.push(format!("- Price: `{:.2}`", info.last));
        lines.push(format!("- Trend: *{}*", info.trend.label()));
        lines.push(format!("- Momentum: *{}*", info.momentum.label()));
        if let Some(flow) = &info.flow {
            lines.push(format!("- Net delta: `{:.0} USDT`", flow.net_delta));
            match &flow.buy_whale {
                Some(w) => lines.push(format!("- Buy whale: ~${:.0} [{}]", w.notional, w.tier.as_str())),
                None => lines.push("- No qualifying buy whale".to_string()),
            }
        }
    }

    lines.push(format!("\n*Entry signals (top {} USDT spot)*", universe_size));
    if signals.is_empty() {
        lines.push("_No signals this scan._".to_string());
    } else {
        let mut top_tier = Vec::new();
        for s in signals {
            lines.push(format!("\n*{} ({})*", s.symbol, s.side.as_str()));
            lines.push(format!("- Close: `{:.4}`", s.last_close));
            lines.push(format!("- Structure: {}", structure_label(s)));
            lines.push(format!("- Net delta: `{:.0} USDT`", s.net_delta));
            match &s.whale {
                Some(w) => lines.push(format!(
                    "- Whale: {} ~${:.0} @ {:.4} [{}]",
                    match s.side {
                        Side::Long => "BUY",
                        Side::Short => "SELL",
                    },
                    w.notional,
                    w.price,
                    w.tier.as_str(),
                )),
                None => lines.push("- Whale: none".to_string()),
            }
            lines.push(format!(
                "- Orderbook (bid/ask notional): `{:.0} / {:.0}`",
                s.bid_notional, s.ask_notional
            ));
            if let Some(note) = momentum_note(s) {
                lines.push(format!("- Momentum: {}", note));
            }
            lines.push(format!("- Confidence: *{}%*", s.confidence));
            lines.push(format!("- Segment: {}", s.segment.as_str()));

            if let Some(w) = &s.whale {
                if w.tier == WhaleTier::X {
                    top_tier.push((s.symbol.clone(), s.side, w.notional));
                }
            }
        }

        if !top_tier.is_empty() {
            lines.push("\n*Top-tier whale summary*".to_string());
            for (symbol, side, notional) in top_tier {
                lines.push(format!("- {} ({}) whale ~${:.0}", symbol, side.as_str(), notional));
            }
        }
    }

    lines.push(format!(
        "\n_Time:_ `{}`",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}
