//! OKX public-data adapter: spot tickers, candles, trade tape, order books.
//! No authentication; the scanner only reads market data.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::exchange::retry::{retry_async, RetryConfig};
use crate::exchange::MarketData;
use crate::logging::{log_event, now_ms, obj, v_num, v_str, Level};
use crate::market::{Candle, MarketCapSegment, OrderBookSnapshot, Trade, TradeSide};

const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Deserialize)]
struct OkxEnvelope<T> {
    code: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct OkxTicker {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "volCcy24h", default)]
    vol_ccy_24h: String,
}

#[derive(Deserialize)]
struct OkxTrade {
    px: String,
    sz: String,
    side: String,
    ts: String,
}

#[derive(Deserialize)]
struct OkxBook {
    #[serde(default)]
    bids: Vec<Vec<String>>,
    #[serde(default)]
    asks: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct CapsRow {
    symbol: String,
    market_cap: Option<f64>,
}

pub struct OkxMarketData {
    client: Client,
    base: String,
    caps_base: String,
    top_limit: usize,
    retry: RetryConfig,
    // Lazily fetched base-currency -> market cap table; one load per scan.
    caps: Mutex<Option<HashMap<String, f64>>>,
}

impl OkxMarketData {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base: cfg.okx_base.clone(),
            caps_base: cfg.caps_base.clone(),
            top_limit: cfg.top_limit,
            retry: RetryConfig::default(),
            caps: Mutex::new(None),
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base, path);
        let resp = self.client.get(&url).query(query).send().await?;
        let envelope: OkxEnvelope<T> = resp.json().await?;
        if envelope.code != "0" {
            return Err(anyhow!("okx error code {} on {}", envelope.code, path));
        }
        Ok(envelope.data)
    }

    async fn load_caps(&self) -> HashMap<String, f64> {
        let mut guard = self.caps.lock().await;
        if let Some(map) = guard.as_ref() {
            return map.clone();
        }
        let url = format!("{}/api/v3/coins/markets", self.caps_base);
        let fetched = retry_async(&self.retry, "fetch_market_caps", || async {
            let resp = self
                .client
                .get(&url)
                .query(&[
                    ("vs_currency", "usd"),
                    ("order", "market_cap_desc"),
                    ("per_page", "250"),
                    ("page", "1"),
                ])
                .send()
                .await?;
            let rows: Vec<CapsRow> = resp.json().await?;
            Ok(rows)
        })
        .await;

        let map = match fetched {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|r| r.market_cap.map(|cap| (r.symbol.to_uppercase(), cap)))
                .collect(),
            Err(e) => {
                // Degrade to the unknown-cap bucket rather than failing the scan.
                log_event(
                    Level::Warn,
                    "okx",
                    "caps_unavailable",
                    obj(&[("error", v_str(&e.to_string()))]),
                );
                HashMap::new()
            }
        };
        *guard = Some(map.clone());
        map
    }
}

fn base_currency(symbol: &str) -> &str {
    symbol.split('-').next().unwrap_or(symbol)
}

fn sum_level_notional(levels: &[Vec<String>]) -> f64 {
    levels
        .iter()
        .filter_map(|level| {
            let px: f64 = level.first()?.parse().ok()?;
            let sz: f64 = level.get(1)?.parse().ok()?;
            Some(px * sz)
        })
        .sum()
}

fn best_price(levels: &[Vec<String>]) -> Option<f64> {
    levels.first()?.first()?.parse().ok()
}

#[async_trait]
impl MarketData for OkxMarketData {
    async fn list_instruments(&self) -> Result<Vec<String>> {
        let tickers = retry_async(&self.retry, "fetch_tickers", || async {
            self.fetch::<OkxTicker>("/api/v5/market/tickers", &[("instType", "SPOT".to_string())])
                .await
        })
        .await?;

        let mut rows: Vec<(String, f64)> = tickers
            .into_iter()
            .filter(|t| t.inst_id.ends_with("-USDT"))
            .map(|t| {
                let vol = t.vol_ccy_24h.parse().unwrap_or(0.0);
                (t.inst_id, vol)
            })
            .collect();
        rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        rows.truncate(self.top_limit);
        Ok(rows.into_iter().map(|(s, _)| s).collect())
    }

    async fn candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let raw = retry_async(&self.retry, "fetch_candles", || async {
            self.fetch::<Vec<String>>(
                "/api/v5/market/candles",
                &[
                    ("instId", symbol.to_string()),
                    ("bar", timeframe.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
        })
        .await?;

        // OKX returns the newest candle first; a malformed row drops that
        // row, not the batch.
        let mut candles: Vec<Candle> = raw
            .iter()
            .rev()
            .filter_map(|row| {
                Some(Candle {
                    ts_ms: row.first()?.parse().ok()?,
                    open: row.get(1)?.parse().ok()?,
                    high: row.get(2)?.parse().ok()?,
                    low: row.get(3)?.parse().ok()?,
                    close: row.get(4)?.parse().ok()?,
                })
            })
            .collect();
        candles.sort_by_key(|c| c.ts_ms);
        Ok(candles)
    }

    async fn recent_trades(&self, symbol: &str, limit: usize, max_age_secs: u64) -> Result<Vec<Trade>> {
        let raw = retry_async(&self.retry, "fetch_trades", || async {
            self.fetch::<OkxTrade>(
                "/api/v5/market/trades",
                &[("instId", symbol.to_string()), ("limit", limit.to_string())],
            )
            .await
        })
        .await?;

        let cutoff_ms = if max_age_secs > 0 {
            now_ms() - max_age_secs as i64 * 1000
        } else {
            i64::MIN
        };
        Ok(raw
            .iter()
            .filter_map(|t| {
                let side = match t.side.as_str() {
                    "buy" => TradeSide::Buy,
                    "sell" => TradeSide::Sell,
                    _ => return None,
                };
                let trade = Trade {
                    price: t.px.parse().ok()?,
                    size: t.sz.parse().ok()?,
                    side,
                    ts_ms: t.ts.parse().ok()?,
                };
                (trade.ts_ms >= cutoff_ms).then_some(trade)
            })
            .collect())
    }

    async fn order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot> {
        let books = retry_async(&self.retry, "fetch_order_book", || async {
            self.fetch::<OkxBook>(
                "/api/v5/market/books",
                &[("instId", symbol.to_string()), ("sz", depth.to_string())],
            )
            .await
        })
        .await?;
        let book = books.first().ok_or_else(|| anyhow!("empty order book for {}", symbol))?;
        Ok(OrderBookSnapshot {
            bid_notional: sum_level_notional(&book.bids),
            ask_notional: sum_level_notional(&book.asks),
            best_bid: best_price(&book.bids),
            best_ask: best_price(&book.asks),
        })
    }

    async fn market_cap_segment(&self, symbol: &str) -> Result<MarketCapSegment> {
        let caps = self.load_caps().await;
        let cap = caps.get(base_currency(symbol)).copied();
        let segment = MarketCapSegment::from_cap(cap);
        log_event(
            Level::Debug,
            "okx",
            "segment",
            obj(&[
                ("symbol", v_str(symbol)),
                ("cap", cap.map(v_num).unwrap_or(serde_json::Value::Null)),
                ("segment", v_str(segment.as_str())),
            ]),
        );
        Ok(segment)
    }
}
