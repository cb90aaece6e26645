//! Technical indicators - pure functions over a fetched price window.
//!
//! A scan works on frozen windows, so these recompute from the full slice
//! each cycle instead of keeping incremental state.

/// Exponential moving average. Seeded with the simple mean of the first
/// `period` values, then smoothed with k = 2/(period+1).
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut acc = values[..period].iter().sum::<f64>() / period as f64;
    for v in &values[period..] {
        acc = v * k + acc * (1.0 - k);
    }
    Some(acc)
}

/// Relative Strength Index with Wilder smoothing (alpha = 1/period).
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut seeded = false;
    for pair in closes.windows(2) {
        let change = pair[1] - pair[0];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        if !seeded {
            avg_gain = gain;
            avg_loss = loss;
            seeded = true;
        } else {
            avg_gain = gain * alpha + avg_gain * (1.0 - alpha);
            avg_loss = loss * alpha + avg_loss * (1.0 - alpha);
        }
    }
    let rs = avg_gain / (avg_loss + 1e-12);
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Average Directional Index. Directional movement and true range smoothed
/// with alpha = 1/period, DX = |+DI - -DI| / (+DI + -DI) * 100, ADX = smoothed DX.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    let n = high.len();
    if period == 0 || n < 2 || low.len() != n || close.len() != n {
        return None;
    }
    let alpha = 1.0 / period as f64;

    struct Smoothed {
        value: f64,
        seeded: bool,
        alpha: f64,
    }
    impl Smoothed {
        fn new(alpha: f64) -> Self {
            Self { value: 0.0, seeded: false, alpha }
        }
        fn push(&mut self, v: f64) -> f64 {
            if self.seeded {
                self.value = v * self.alpha + self.value * (1.0 - self.alpha);
            } else {
                self.value = v;
                self.seeded = true;
            }
            self.value
        }
    }

    let mut atr = Smoothed::new(alpha);
    let mut plus_sm = Smoothed::new(alpha);
    let mut minus_sm = Smoothed::new(alpha);
    let mut adx_sm = Smoothed::new(alpha);

    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };

        let tr = (high[i] - low[i])
            .max((high[i] - close[i - 1]).abs())
            .max((low[i] - close[i - 1]).abs());

        let atr_v = atr.push(tr);
        let plus_di = 100.0 * plus_sm.push(plus_dm) / (atr_v + 1e-12);
        let minus_di = 100.0 * minus_sm.push(minus_dm) / (atr_v + 1e-12);
        let dx = (plus_di - minus_di).abs() / (plus_di + minus_di + 1e-12) * 100.0;
        adx_sm.push(dx);
    }
    Some(adx_sm.value)
}
