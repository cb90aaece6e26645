//! End-to-end scans against fixture adapters: signal detection, cooldown
//! suppression across runs, per-symbol failure isolation, notifier behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use flowscan::config::{Config, ThresholdTable};
use flowscan::cooldown::CooldownStore;
use flowscan::exchange::{MarketData, Notifier};
use flowscan::logging::now_ms;
use flowscan::market::{Candle, MarketCapSegment, OrderBookSnapshot, Trade, TradeSide};
use flowscan::scanner::Scanner;
use flowscan::scoring::Side;

const BAR_MS: i64 = 4 * 3600 * 1000;

fn test_config() -> Config {
    Config {
        top_limit: 150,
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
        reference_symbols: vec![],
        cooldown_ttl_secs: 3_600,
        cooldown_path: String::new(),
        concurrency: 4,
        okx_base: String::new(),
        caps_base: String::new(),
        telegram_token: None,
        telegram_chat_id: None,
    }
}

#[derive(Default, Clone)]
struct FixtureData {
    symbols: Vec<String>,
    // keyed by "SYMBOL:TIMEFRAME" so confirmation candles can differ
    candles: HashMap<String, Vec<Candle>>,
    trades: HashMap<String, Vec<Trade>>,
    books: HashMap<String, OrderBookSnapshot>,
    segments: HashMap<String, MarketCapSegment>,
}

impl FixtureData {
    fn with_candles(mut self, symbol: &str, timeframe: &str, candles: Vec<Candle>) -> Self {
        self.candles.insert(format!("{}:{}", symbol, timeframe), candles);
        self
    }
}

#[async_trait]
impl MarketData for FixtureData {
    async fn list_instruments(&self) -> Result<Vec<String>> {
        Ok(self.symbols.clone())
    }

    async fn candles(&self, symbol: &str, timeframe: &str, _limit: usize) -> Result<Vec<Candle>> {
        if symbol.starts_with("ERR") {
            return Err(anyhow!("fixture outage for {}", symbol));
        }
        Ok(self
            .candles
            .get(&format!("{}:{}", symbol, timeframe))
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_trades(&self, symbol: &str, _limit: usize, _max_age_secs: u64) -> Result<Vec<Trade>> {
        Ok(self.trades.get(symbol).cloned().unwrap_or_default())
    }

    async fn order_book(&self, symbol: &str, _depth: usize) -> Result<OrderBookSnapshot> {
        Ok(self.books.get(symbol).copied().unwrap_or_default())
    }

    async fn market_cap_segment(&self, symbol: &str) -> Result<MarketCapSegment> {
        Ok(self
            .segments
            .get(symbol)
            .copied()
            .unwrap_or(MarketCapSegment::Micro))
    }
}

struct CollectingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _message: &str) -> Result<()> {
        Err(anyhow!("delivery refused"))
    }
}

fn candle(ts_ms: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle { ts_ms, open, high, low, close }
}

fn flat_series(n: usize, close: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let ts = i as i64 * BAR_MS;
            candle(ts, close, close + 0.2, close - 0.2, close)
        })
        .collect()
}

/// 30 flat candles at 100 closed by a break candle. `last_close` above
/// 100.1 breaks bullish, below 99.9 breaks bearish.
fn break_series(last_close: f64) -> Vec<Candle> {
    let mut candles = flat_series(30, 100.0);
    let ts = 30 * BAR_MS;
    candles.push(candle(ts, 100.0, last_close.max(100.0) + 0.2, last_close.min(100.0) - 0.2, last_close));
    candles
}

fn last_ts(candles: &[Candle]) -> i64 {
    candles.last().unwrap().ts_ms
}

fn whale_trade(price: f64, notional: f64, side: TradeSide, ts_ms: i64) -> Trade {
    Trade { price, size: notional / price, side, ts_ms }
}

/// Fixture where AAA-USDT satisfies all four long conditions.
fn bullish_fixture() -> FixtureData {
    let candles = break_series(100.5);
    let t = last_ts(&candles);
    let trades = vec![
        whale_trade(100.4, 600_000.0, TradeSide::Buy, t - 60_000),
        whale_trade(100.2, 50_000.0, TradeSide::Buy, t - 120_000),
        whale_trade(100.3, 10_000.0, TradeSide::Sell, t - 90_000),
    ];
    let mut fixture = FixtureData {
        symbols: vec!["AAA-USDT".to_string()],
        ..Default::default()
    }
    .with_candles("AAA-USDT", "4H", candles);
    fixture.trades.insert("AAA-USDT".to_string(), trades);
    fixture.books.insert(
        "AAA-USDT".to_string(),
        OrderBookSnapshot {
            bid_notional: 2_000_000.0,
            ask_notional: 1_000_000.0,
            best_bid: Some(100.4),
            best_ask: Some(100.6),
        },
    );
    fixture
        .segments
        .insert("AAA-USDT".to_string(), MarketCapSegment::Mid);
    fixture
}

/// Fixture where BBB-USDT satisfies all four short conditions.
fn bearish_fixture() -> FixtureData {
    let candles = break_series(99.5);
    let t = last_ts(&candles);
    let trades = vec![
        whale_trade(99.6, 600_000.0, TradeSide::Sell, t - 60_000),
        whale_trade(99.7, 40_000.0, TradeSide::Sell, t - 120_000),
        whale_trade(99.8, 10_000.0, TradeSide::Buy, t - 90_000),
    ];
    let mut fixture = FixtureData {
        symbols: vec!["BBB-USDT".to_string()],
        ..Default::default()
    }
    .with_candles("BBB-USDT", "4H", candles);
    fixture.trades.insert("BBB-USDT".to_string(), trades);
    fixture.books.insert(
        "BBB-USDT".to_string(),
        OrderBookSnapshot {
            bid_notional: 1_000_000.0,
            ask_notional: 2_000_000.0,
            best_bid: Some(99.4),
            best_ask: Some(99.6),
        },
    );
    fixture
        .segments
        .insert("BBB-USDT".to_string(), MarketCapSegment::Mid);
    fixture
}

fn collecting_scanner(
    cfg: Config,
    fixture: FixtureData,
    store: CooldownStore,
) -> (Scanner, Arc<Mutex<Vec<String>>>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let notifier = CollectingNotifier { messages: messages.clone() };
    let scanner = Scanner::new(cfg, Arc::new(fixture), Box::new(notifier), store);
    (scanner, messages)
}

#[tokio::test]
async fn full_scan_emits_long_signal() {
    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, messages) = collecting_scanner(test_config(), bullish_fixture(), store);

    let outcome = scanner.run().await.unwrap();
    assert_eq!(outcome.signals.len(), 1);
    let signal = &outcome.signals[0];
    assert_eq!(signal.symbol, "AAA-USDT");
    assert_eq!(signal.side, Side::Long);
    assert_eq!(signal.confidence, 100);
    assert!(signal.msb);
    assert!(outcome.notified);

    let sent = messages.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("AAA-USDT (LONG)"));
    assert!(sent[0].contains("Bullish MSB"));
}

#[tokio::test]
async fn cooldown_suppresses_repeat_alert() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cd.sqlite");
    let path = path.to_str().unwrap();

    let store = CooldownStore::open(path, 3_600, now_ms()).unwrap();
    let (scanner, _) = collecting_scanner(test_config(), bullish_fixture(), store);
    let first = scanner.run().await.unwrap();
    assert_eq!(first.signals.len(), 1);
    drop(scanner);

    // Same universe a few minutes later: the entry is still live.
    let store = CooldownStore::open(path, 3_600, now_ms()).unwrap();
    let (scanner, messages) = collecting_scanner(test_config(), bullish_fixture(), store);
    let second = scanner.run().await.unwrap();
    assert!(second.signals.is_empty());
    assert_eq!(second.skipped_cooldown, 1);
    assert!(!second.notified);
    assert!(messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_symbol_does_not_abort_scan() {
    let mut fixture = bullish_fixture();
    fixture.symbols.insert(0, "ERR-USDT".to_string());

    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, _) = collecting_scanner(test_config(), fixture, store);
    let outcome = scanner.run().await.unwrap();

    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.signals.len(), 1, "healthy symbol still scanned");
}

#[tokio::test]
async fn notifier_failure_is_tolerated() {
    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let scanner = Scanner::new(
        test_config(),
        Arc::new(bullish_fixture()),
        Box::new(FailingNotifier),
        store,
    );
    let outcome = scanner.run().await.unwrap();
    assert_eq!(outcome.signals.len(), 1);
    assert!(!outcome.notified);
}

#[tokio::test]
async fn insufficient_history_yields_no_evidence() {
    let mut fixture = bullish_fixture();
    fixture
        .candles
        .insert("AAA-USDT:4H".to_string(), flat_series(10, 100.0));

    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, _) = collecting_scanner(test_config(), fixture, store);
    let outcome = scanner.run().await.unwrap();
    assert!(outcome.signals.is_empty());
    assert_eq!(outcome.failed, 0, "thin history is not an error");
}

#[tokio::test]
async fn trend_confirmation_gates_signal() {
    let mut cfg = test_config();
    cfg.require_trend_confirm = true;

    // Lower timeframe in a downtrend: the long must be vetoed.
    let down: Vec<Candle> = (0..60)
        .map(|i| {
            let close = 130.0 - i as f64 * 0.5;
            candle(i as i64 * 3_600_000, close, close + 0.2, close - 0.2, close)
        })
        .collect();
    let fixture = bullish_fixture().with_candles("AAA-USDT", "1H", down);

    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, _) = collecting_scanner(cfg, fixture, store);
    let outcome = scanner.run().await.unwrap();
    assert!(outcome.signals.is_empty());

    // Aligned lower timeframe: the long passes.
    let mut cfg = test_config();
    cfg.require_trend_confirm = true;
    let up: Vec<Candle> = (0..60)
        .map(|i| {
            let close = 100.0 + i as f64 * 0.5;
            candle(i as i64 * 3_600_000, close, close + 0.2, close - 0.2, close)
        })
        .collect();
    let fixture = bullish_fixture().with_candles("AAA-USDT", "1H", up);
    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, _) = collecting_scanner(cfg, fixture, store);
    let outcome = scanner.run().await.unwrap();
    assert_eq!(outcome.signals.len(), 1);
}

#[tokio::test]
async fn regime_gate_vetoes_countertrend_short() {
    let mut cfg = test_config();
    cfg.require_bear_regime_for_shorts = true;

    // Broad market grinding up: the short is countertrend.
    let btc_up: Vec<Candle> = (0..120)
        .map(|i| {
            let close = 30_000.0 + i as f64 * 50.0;
            candle(i as i64 * 3_600_000, close, close + 10.0, close - 10.0, close)
        })
        .collect();
    let fixture = bearish_fixture().with_candles("BTC-USDT", "1H", btc_up);
    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, _) = collecting_scanner(cfg, fixture, store);
    let outcome = scanner.run().await.unwrap();
    assert!(outcome.signals.is_empty());

    // Broad market bleeding: the short is allowed.
    let mut cfg = test_config();
    cfg.require_bear_regime_for_shorts = true;
    let btc_down: Vec<Candle> = (0..120)
        .map(|i| {
            let close = 40_000.0 - i as f64 * 50.0;
            candle(i as i64 * 3_600_000, close, close + 10.0, close - 10.0, close)
        })
        .collect();
    let fixture = bearish_fixture().with_candles("BTC-USDT", "1H", btc_down);
    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, _) = collecting_scanner(cfg, fixture, store);
    let outcome = scanner.run().await.unwrap();
    assert_eq!(outcome.signals.len(), 1);
    assert_eq!(outcome.signals[0].side, Side::Short);
}

#[tokio::test]
async fn reference_summary_lands_in_message() {
    let mut cfg = test_config();
    cfg.reference_symbols = vec!["BTC-USDT".to_string()];

    let btc: Vec<Candle> = (0..220)
        .map(|i| {
            let close = 30_000.0 + i as f64 * 20.0;
            candle(i as i64 * BAR_MS, close, close + 10.0, close - 10.0, close)
        })
        .collect();
    let mut fixture = bullish_fixture().with_candles("BTC-USDT", "4H", btc);
    fixture
        .segments
        .insert("BTC-USDT".to_string(), MarketCapSegment::High);

    let store = CooldownStore::open_in_memory(3_600).unwrap();
    let (scanner, messages) = collecting_scanner(cfg, fixture, store);
    let outcome = scanner.run().await.unwrap();
    assert_eq!(outcome.signals.len(), 1);

    let sent = messages.lock().unwrap();
    assert!(sent[0].contains("*BTC-USDT*"));
    assert!(sent[0].contains("Trend: *Up*"));
}
