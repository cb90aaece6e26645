use crate::market::MarketCapSegment;

/// Whale and delta thresholds for one market-cap segment, in quote notional.
/// Invariant: whale_s < whale_m < whale_x within a row.
#[derive(Debug, Clone, Copy)]
pub struct SegmentThresholds {
    pub whale_s: f64,
    pub whale_m: f64,
    pub whale_x: f64,
    pub net_delta_min: f64,
}

/// Per-segment threshold rows, injected through `Config` so variant behavior
/// is a configuration change rather than a code fork.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdTable {
    pub high: SegmentThresholds,
    pub mid: SegmentThresholds,
    pub low: SegmentThresholds,
    pub micro: SegmentThresholds,
}

impl ThresholdTable {
    pub fn for_segment(&self, segment: MarketCapSegment) -> &SegmentThresholds {
        match segment {
            MarketCapSegment::High => &self.high,
            MarketCapSegment::Mid => &self.mid,
            MarketCapSegment::Low => &self.low,
            MarketCapSegment::Micro => &self.micro,
        }
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            high: SegmentThresholds {
                whale_s: 400_000.0,
                whale_m: 2_000_000.0,
                whale_x: 8_000_000.0,
                net_delta_min: 200_000.0,
            },
            mid: SegmentThresholds {
                whale_s: 100_000.0,
                whale_m: 500_000.0,
                whale_x: 2_000_000.0,
                net_delta_min: 50_000.0,
            },
            low: SegmentThresholds {
                whale_s: 40_000.0,
                whale_m: 200_000.0,
                whale_x: 800_000.0,
                net_delta_min: 20_000.0,
            },
            micro: SegmentThresholds {
                whale_s: 15_000.0,
                whale_m: 75_000.0,
                whale_x: 300_000.0,
                net_delta_min: 8_000.0,
            },
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// How many instruments (by 24h quote volume) the scan covers.
    pub top_limit: usize,
    /// Primary timeframe the structure engine works on (venue bar format).
    pub timeframe: String,
    pub candle_limit: usize,
    pub trades_limit: usize,
    /// Drop tape entries older than this; 0 disables the age filter.
    pub trade_max_age_secs: u64,
    pub orderbook_depth: usize,

    pub struct_lookback: usize,
    pub break_buffer: f64,
    pub zone_buffer: f64,

    pub book_ratio: f64,
    pub min_conditions: usize,
    pub max_level_distance: f64,
    pub whale_max_distance: f64,
    pub whale_max_age_secs: u64,
    pub thresholds: ThresholdTable,

    /// Lower-timeframe trend confirmation gate (EMA20/EMA50 + bounded move).
    pub require_trend_confirm: bool,
    pub confirm_timeframe: String,
    pub max_recent_change_pct: f64,
    /// When set, Short signals also require the regime symbol to be bearish.
    pub require_bear_regime_for_shorts: bool,
    pub regime_symbol: String,
    pub reference_symbols: Vec<String>,

    pub cooldown_ttl_secs: u64,
    pub cooldown_path: String,
    pub concurrency: usize,

    pub okx_base: String,
    pub caps_base: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            top_limit: env_parse("TOP_LIMIT", 150),
            timeframe: env_str("TIMEFRAME", "4H"),
            candle_limit: env_parse("CANDLE_LIMIT", 200),
            trades_limit: env_parse("TRADES_LIMIT", 200),
            trade_max_age_secs: env_parse("TRADE_MAX_AGE_SECS", 900),
            orderbook_depth: env_parse("ORDERBOOK_DEPTH", 20),
            struct_lookback: env_parse("STRUCT_LOOKBACK", 20),
            break_buffer: env_parse("BREAK_BUFFER", 0.001),
            zone_buffer: env_parse("ZONE_BUFFER", 0.002),
            book_ratio: env_parse("BOOK_RATIO", 1.3),
            min_conditions: env_parse("MIN_CONDITIONS", 3),
            max_level_distance: env_parse("MAX_LEVEL_DISTANCE", 0.01),
            whale_max_distance: env_parse("WHALE_MAX_DISTANCE", 0.008),
            whale_max_age_secs: env_parse("WHALE_MAX_AGE_SECS", 14_400),
            thresholds: ThresholdTable::default(),
            require_trend_confirm: env_flag("REQUIRE_TREND_CONFIRM"),
            confirm_timeframe: env_str("CONFIRM_TIMEFRAME", "1H"),
            max_recent_change_pct: env_parse("MAX_RECENT_CHANGE_PCT", 3.0),
            require_bear_regime_for_shorts: env_flag("REQUIRE_BEAR_REGIME_FOR_SHORTS"),
            regime_symbol: env_str("REGIME_SYMBOL", "BTC-USDT"),
            reference_symbols: vec!["BTC-USDT".to_string(), "ETH-USDT".to_string()],
            cooldown_ttl_secs: env_parse("COOLDOWN_TTL_SECS", 3_600),
            cooldown_path: env_str("COOLDOWN_PATH", "./flowscan.sqlite"),
            concurrency: env_parse("SCAN_CONCURRENCY", 8.min(num_cpus::get())),
            okx_base: env_str("OKX_BASE", "https://www.okx.com"),
            caps_base: env_str("CAPS_BASE", "https://api.coingecko.com"),
            telegram_token: std::env::var("TELEGRAM_TOKEN").ok(),
            telegram_chat_id: std::env::var("CHAT_ID").ok(),
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        top_limit: 10,
        timeframe: "4H".to_string(),
        candle_limit: 200,
        trades_limit: 200,
        trade_max_age_secs: 0,
        orderbook_depth: 20,
        struct_lookback: 20,
        break_buffer: 0.001,
        zone_buffer: 0.002,
        book_ratio: 1.3,
        min_conditions: 3,
        max_level_distance: 0.01,
        whale_max_distance: 0.008,
        whale_max_age_secs: 14_400,
        thresholds: ThresholdTable::default(),
        require_trend_confirm: false,
        confirm_timeframe: "1H".to_string(),
        max_recent_change_pct: 3.0,
        require_bear_regime_for_shorts: false,
        regime_symbol: "BTC-USDT".to_string(),
        reference_symbols: vec!["BTC-USDT".to_string()],
        cooldown_ttl_secs: 3_600,
        cooldown_path: String::new(),
        concurrency: 2,
        okx_base: String::new(),
        caps_base: String::new(),
        telegram_token: None,
        telegram_chat_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_rows_strictly_increase() {
        let table = ThresholdTable::default();
        for row in [&table.high, &table.mid, &table.low, &table.micro] {
            assert!(row.whale_s < row.whale_m);
            assert!(row.whale_m < row.whale_x);
        }
    }

    #[test]
    fn test_thresholds_scale_down_with_segment() {
        let table = ThresholdTable::default();
        assert!(table.high.whale_s > table.mid.whale_s);
        assert!(table.mid.whale_s > table.low.whale_s);
        assert!(table.low.whale_s > table.micro.whale_s);
        assert!(table.high.net_delta_min > table.mid.net_delta_min);
        assert!(table.mid.net_delta_min > table.low.net_delta_min);
        assert!(table.low.net_delta_min > table.micro.net_delta_min);
    }

    #[test]
    fn test_segment_lookup() {
        let table = ThresholdTable::default();
        let row = table.for_segment(MarketCapSegment::Mid);
        assert_eq!(row.whale_s, 100_000.0);
        let row = table.for_segment(MarketCapSegment::Micro);
        assert_eq!(row.whale_s, 15_000.0);
    }
}
