//! Price-structure detection: market structure breaks and fair value gaps.

use crate::market::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Bullish,
    Bearish,
}

/// A gap between candle i-2 and candle i, treated as a support (bullish) or
/// resistance (bearish) zone until retested.
#[derive(Debug, Clone, Copy)]
pub struct FvgZone {
    pub direction: Direction,
    pub low: f64,
    pub high: f64,
}

impl FvgZone {
    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

/// Structure read over one candle window, re-derived each scan cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureView {
    pub bullish_msb: bool,
    pub bull_level: Option<f64>,
    pub bearish_msb: bool,
    pub bear_level: Option<f64>,
    pub fvg: Option<FvgZone>,
    pub bullish_fvg_reject: bool,
    pub bearish_fvg_reject: bool,
}

impl StructureView {
    pub fn evaluate(candles: &[Candle], lookback: usize, break_buffer: f64, zone_buffer: f64) -> Self {
        let (bullish_msb, bull_level) = detect_bullish_msb(candles, lookback, break_buffer);
        let (bearish_msb, bear_level) = detect_bearish_msb(candles, lookback, break_buffer);
        let fvg = find_recent_fvg(candles, lookback);

        let mut view = StructureView {
            bullish_msb,
            bull_level,
            bearish_msb,
            bear_level,
            fvg,
            bullish_fvg_reject: false,
            bearish_fvg_reject: false,
        };
        if let Some(zone) = fvg {
            if rejects_zone(candles, &zone, zone_buffer) {
                match zone.direction {
                    Direction::Bullish => view.bullish_fvg_reject = true,
                    Direction::Bearish => view.bearish_fvg_reject = true,
                }
            }
        }
        view
    }

    pub fn long_evidence(&self) -> bool {
        self.bullish_msb || self.bullish_fvg_reject
    }

    pub fn short_evidence(&self) -> bool {
        self.bearish_msb || self.bearish_fvg_reject
    }

    /// Reference price for the distance guard: the broken MSB level when one
    /// fired, otherwise the midpoint of the rejected gap zone.
    pub fn reference_level(&self, direction: Direction) -> Option<f64> {
        match direction {
            Direction::Bullish => {
                if self.bullish_msb {
                    self.bull_level
                } else if self.bullish_fvg_reject {
                    self.fvg.map(|z| z.midpoint())
                } else {
                    None
                }
            }
            Direction::Bearish => {
                if self.bearish_msb {
                    self.bear_level
                } else if self.bearish_fvg_reject {
                    self.fvg.map(|z| z.midpoint())
                } else {
                    None
                }
            }
        }
    }
}

/// Bullish market structure break: the last close clears the highest close
/// of the `lookback` candles preceding it by `break_buffer`.
pub fn detect_bullish_msb(candles: &[Candle], lookback: usize, break_buffer: f64) -> (bool, Option<f64>) {
    let n = candles.len();
    if n < lookback + 2 {
        return (false, None);
    }
    let level = candles[n - 1 - lookback..n - 1]
        .iter()
        .map(|c| c.close)
        .fold(f64::NEG_INFINITY, f64::max);
    let last_close = candles[n - 1].close;
    (last_close > level * (1.0 + break_buffer), Some(level))
}

/// Bearish market structure break, symmetric around the lowest close.
pub fn detect_bearish_msb(candles: &[Candle], lookback: usize, break_buffer: f64) -> (bool, Option<f64>) {
    let n = candles.len();
    if n < lookback + 2 {
        return (false, None);
    }
    let level = candles[n - 1 - lookback..n - 1]
        .iter()
        .map(|c| c.close)
        .fold(f64::INFINITY, f64::min);
    let last_close = candles[n - 1].close;
    (last_close < level * (1.0 - break_buffer), Some(level))
}

/// Scan the lookback for (i-2, i) gaps. Later gaps replace earlier ones:
/// only the most recently observed zone is retained.
pub fn find_recent_fvg(candles: &[Candle], lookback: usize) -> Option<FvgZone> {
    let n = candles.len();
    if n < 3 {
        return None;
    }
    let start = 2usize.max(n.saturating_sub(lookback));
    let mut last = None;
    for i in start..n {
        let first = &candles[i - 2];
        let third = &candles[i];
        if first.high < third.low {
            last = Some(FvgZone {
                direction: Direction::Bullish,
                low: first.high,
                high: third.low,
            });
        }
        if first.low > third.high {
            last = Some(FvgZone {
                direction: Direction::Bearish,
                low: third.high,
                high: first.low,
            });
        }
    }
    last
}

/// Rejection test on the most recent candle: its range must touch the zone,
/// and the close must push away from it in the zone's direction.
fn rejects_zone(candles: &[Candle], zone: &FvgZone, zone_buffer: f64) -> bool {
    let last = match candles.last() {
        Some(c) => c,
        None => return false,
    };
    let touched = !(last.high < zone.low || last.low > zone.high);
    if !touched {
        return false;
    }
    match zone.direction {
        Direction::Bullish => {
            last.close > last.open && last.close > zone.low * (1.0 + zone_buffer / 2.0)
        }
        Direction::Bearish => {
            last.close < last.open && last.close < zone.high * (1.0 - zone_buffer / 2.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(ts: i64, px: f64) -> Candle {
        Candle { ts_ms: ts, open: px, high: px + 0.5, low: px - 0.5, close: px }
    }

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| flat(i as i64 * 60_000, c))
            .collect()
    }

    #[test]
    fn test_bullish_msb_fires_above_buffer() {
        let mut candles = series(&vec![100.0; 25]);
        candles.push(flat(25 * 60_000, 100.5)); // 0.5% above the 100.0 ceiling
        let (broke, level) = detect_bullish_msb(&candles, 20, 0.001);
        assert!(broke);
        assert_eq!(level, Some(100.0));
    }

    #[test]
    fn test_bullish_msb_requires_close_beyond_buffer() {
        let mut candles = series(&vec![100.0; 25]);
        candles.push(flat(25 * 60_000, 100.05)); // +0.05%, inside the 0.1% buffer
        let (broke, _) = detect_bullish_msb(&candles, 20, 0.001);
        assert!(!broke);
    }

    #[test]
    fn test_bearish_msb_symmetric() {
        let mut candles = series(&vec![100.0; 25]);
        candles.push(flat(25 * 60_000, 99.5));
        let (broke, level) = detect_bearish_msb(&candles, 20, 0.001);
        assert!(broke);
        assert_eq!(level, Some(100.0));
    }

    #[test]
    fn test_msb_short_window_no_evidence() {
        let candles = series(&vec![100.0; 10]);
        let (broke, level) = detect_bullish_msb(&candles, 20, 0.001);
        assert!(!broke);
        assert!(level.is_none());
    }

    #[test]
    fn test_fvg_bullish_gap_zone() {
        let mut candles = Vec::new();
        candles.push(Candle { ts_ms: 0, open: 100.0, high: 101.0, low: 99.0, close: 100.5 });
        candles.push(Candle { ts_ms: 1, open: 101.0, high: 103.0, low: 100.5, close: 102.5 });
        // low of this candle (102.0) above high of the first (101.0): gap below
        candles.push(Candle { ts_ms: 2, open: 102.5, high: 104.0, low: 102.0, close: 103.5 });
        let zone = find_recent_fvg(&candles, 20).expect("gap expected");
        assert_eq!(zone.direction, Direction::Bullish);
        assert_eq!(zone.low, 101.0);
        assert_eq!(zone.high, 102.0);
    }

    #[test]
    fn test_fvg_no_false_positive_on_overlap() {
        let candles = series(&vec![100.0; 10]); // ranges all overlap
        assert!(find_recent_fvg(&candles, 20).is_none());
    }

    #[test]
    fn test_fvg_most_recent_wins() {
        let mut candles = Vec::new();
        // First gap: 101 -> 102
        candles.push(Candle { ts_ms: 0, open: 100.0, high: 101.0, low: 99.0, close: 100.5 });
        candles.push(Candle { ts_ms: 1, open: 101.0, high: 103.0, low: 100.5, close: 102.5 });
        candles.push(Candle { ts_ms: 2, open: 102.5, high: 104.0, low: 102.0, close: 103.5 });
        // Second gap later in the window: 104 -> 105
        candles.push(Candle { ts_ms: 3, open: 103.5, high: 104.0, low: 103.0, close: 103.8 });
        candles.push(Candle { ts_ms: 4, open: 104.0, high: 106.0, low: 103.8, close: 105.5 });
        candles.push(Candle { ts_ms: 5, open: 105.5, high: 107.0, low: 105.0, close: 106.5 });
        let zone = find_recent_fvg(&candles, 20).unwrap();
        assert_eq!(zone.low, 104.0);
        assert_eq!(zone.high, 105.0);
    }

    #[test]
    fn test_bullish_rejection_inside_zone() {
        let mut candles = Vec::new();
        candles.push(Candle { ts_ms: 0, open: 100.0, high: 101.0, low: 99.0, close: 100.5 });
        candles.push(Candle { ts_ms: 1, open: 101.0, high: 103.0, low: 100.5, close: 102.5 });
        candles.push(Candle { ts_ms: 2, open: 102.5, high: 104.0, low: 102.0, close: 103.5 });
        // Retest: wick dips into [101, 102], closes back up above zone low.
        candles.push(Candle { ts_ms: 3, open: 101.5, high: 103.0, low: 101.2, close: 102.8 });
        let view = StructureView::evaluate(&candles, 20, 0.001, 0.002);
        assert!(view.bullish_fvg_reject);
        assert!(view.long_evidence());
        assert!(!view.short_evidence());
    }

    #[test]
    fn test_rejection_requires_touch() {
        let mut candles = Vec::new();
        candles.push(Candle { ts_ms: 0, open: 100.0, high: 101.0, low: 99.0, close: 100.5 });
        candles.push(Candle { ts_ms: 1, open: 101.0, high: 103.0, low: 100.5, close: 102.5 });
        candles.push(Candle { ts_ms: 2, open: 102.5, high: 104.0, low: 102.0, close: 103.5 });
        // Last candle stays entirely above the zone: no retest.
        candles.push(Candle { ts_ms: 3, open: 103.0, high: 104.5, low: 102.8, close: 104.0 });
        let view = StructureView::evaluate(&candles, 20, 0.001, 0.002);
        assert!(!view.bullish_fvg_reject);
    }

    #[test]
    fn test_reference_level_prefers_msb() {
        let view = StructureView {
            bullish_msb: true,
            bull_level: Some(100.0),
            fvg: Some(FvgZone { direction: Direction::Bullish, low: 90.0, high: 92.0 }),
            bullish_fvg_reject: true,
            ..Default::default()
        };
        assert_eq!(view.reference_level(Direction::Bullish), Some(100.0));
    }

    #[test]
    fn test_reference_level_falls_back_to_zone_midpoint() {
        let view = StructureView {
            fvg: Some(FvgZone { direction: Direction::Bullish, low: 90.0, high: 92.0 }),
            bullish_fvg_reject: true,
            ..Default::default()
        };
        assert_eq!(view.reference_level(Direction::Bullish), Some(91.0));
        assert_eq!(view.reference_level(Direction::Bearish), None);
    }
}
