//! Scan orchestration: fans the instrument universe out over a bounded
//! worker pool and funnels results through a single aggregation point.

use std::sync::Arc;

use anyhow::Result;
use futures_util::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::cooldown::CooldownStore;
use crate::exchange::{MarketData, Notifier};
use crate::logging::{log_event, now_ms, obj, v_num, v_str, Level};
use crate::market::Candle;
use crate::orderflow;
use crate::report;
use crate::scoring::{self, classify_regime, Regime, ScoreParams, Side, Signal};
use crate::structure::StructureView;

pub struct ScanOutcome {
    pub scanned: usize,
    pub skipped_cooldown: usize,
    pub failed: usize,
    pub signals: Vec<Signal>,
    pub notified: bool,
}

enum SymbolOutcome {
    CoolingDown,
    Clean(Vec<Signal>),
    Failed,
}

pub struct Scanner {
    cfg: Config,
    data: Arc<dyn MarketData>,
    notifier: Box<dyn Notifier>,
    // The cooldown store is the only shared mutable state: read under lock
    // before a symbol is scored, written under lock at aggregation.
    store: Mutex<CooldownStore>,
}

impl Scanner {
    pub fn new(
        cfg: Config,
        data: Arc<dyn MarketData>,
        notifier: Box<dyn Notifier>,
        store: CooldownStore,
    ) -> Self {
        Self { cfg, data, notifier, store: Mutex::new(store) }
    }

    pub async fn run(&self) -> Result<ScanOutcome> {
        let started_ms = now_ms();
        let symbols = self.data.list_instruments().await?;
        log_event(
            Level::Info,
            "scanner",
            "scan_started",
            obj(&[
                ("universe", v_num(symbols.len() as f64)),
                ("timeframe", v_str(&self.cfg.timeframe)),
            ]),
        );

        let references = self.reference_summaries().await;
        let regime = self.market_regime().await;

        let params = ScoreParams::from_config(&self.cfg);
        let outcomes: Vec<SymbolOutcome> = stream::iter(symbols.iter())
            .map(|symbol| self.evaluate_symbol(symbol, &params, regime))
            .buffer_unordered(self.cfg.concurrency.max(1))
            .collect()
            .await;

        // Single aggregation point: cooldown writes and the outbound message
        // happen here, in one task.
        let mut outcome = ScanOutcome {
            scanned: symbols.len(),
            skipped_cooldown: 0,
            failed: 0,
            signals: Vec::new(),
            notified: false,
        };
        for result in outcomes {
            match result {
                SymbolOutcome::CoolingDown => outcome.skipped_cooldown += 1,
                SymbolOutcome::Failed => outcome.failed += 1,
                SymbolOutcome::Clean(signals) => outcome.signals.extend(signals),
            }
        }

        let emission_ms = now_ms();
        {
            let mut store = self.store.lock().await;
            for signal in &outcome.signals {
                store.record(&signal.symbol, emission_ms)?;
            }
        }

        if !outcome.signals.is_empty() {
            let message = report::build_message(
                &self.cfg.timeframe,
                self.cfg.top_limit,
                &references,
                &outcome.signals,
            );
            match self.notifier.notify(&message).await {
                Ok(()) => outcome.notified = true,
                Err(e) => log_event(
                    Level::Warn,
                    "scanner",
                    "notify_failed",
                    obj(&[("error", v_str(&e.to_string()))]),
                ),
            }
        }

        log_event(
            Level::Info,
            "scanner",
            "scan_finished",
            obj(&[
                ("scanned", v_num(outcome.scanned as f64)),
                ("signals", v_num(outcome.signals.len() as f64)),
                ("skipped_cooldown", v_num(outcome.skipped_cooldown as f64)),
                ("failed", v_num(outcome.failed as f64)),
                ("elapsed_ms", v_num((now_ms() - started_ms) as f64)),
            ]),
        );
        Ok(outcome)
    }

    async fn evaluate_symbol(
        &self,
        symbol: &str,
        params: &ScoreParams,
        regime: Option<Regime>,
    ) -> SymbolOutcome {
        {
            let store = self.store.lock().await;
            match store.is_active(symbol, now_ms()) {
                Ok(true) => return SymbolOutcome::CoolingDown,
                Ok(false) => {}
                Err(e) => {
                    log_event(
                        Level::Warn,
                        "scanner",
                        "cooldown_read_failed",
                        obj(&[("symbol", v_str(symbol)), ("error", v_str(&e.to_string()))]),
                    );
                    return SymbolOutcome::Failed;
                }
            }
        }

        match self.analyze(symbol, params, regime).await {
            Ok(signals) => {
                for signal in &signals {
                    log_event(
                        Level::Info,
                        "scanner",
                        "signal",
                        obj(&[
                            ("symbol", v_str(&signal.symbol)),
                            ("side", v_str(signal.side.as_str())),
                            ("confidence", v_num(signal.confidence as f64)),
                            ("net_delta", v_num(signal.net_delta)),
                            ("segment", v_str(signal.segment.as_str())),
                        ]),
                    );
                }
                SymbolOutcome::Clean(signals)
            }
            Err(e) => {
                log_event(
                    Level::Warn,
                    "scanner",
                    "symbol_failed",
                    obj(&[("symbol", v_str(symbol)), ("error", v_str(&e.to_string()))]),
                );
                SymbolOutcome::Failed
            }
        }
    }

    /// Pure per-symbol pipeline once the windows are fetched: structure,
    /// order flow, book, segment thresholds, then both sides of the scorer.
    async fn analyze(
        &self,
        symbol: &str,
        params: &ScoreParams,
        regime: Option<Regime>,
    ) -> Result<Vec<Signal>> {
        let cfg = &self.cfg;
        let candles = self
            .data
            .candles(symbol, &cfg.timeframe, cfg.candle_limit)
            .await?;
        if candles.len() < cfg.struct_lookback + 3 {
            return Ok(Vec::new());
        }
        let trades = self
            .data
            .recent_trades(symbol, cfg.trades_limit, cfg.trade_max_age_secs)
            .await?;
        if trades.is_empty() {
            return Ok(Vec::new());
        }
        let book = self.data.order_book(symbol, cfg.orderbook_depth).await?;
        let segment = self.data.market_cap_segment(symbol).await?;
        let thresholds = cfg.thresholds.for_segment(segment);

        let flow = orderflow::classify(&trades, thresholds);
        let structure =
            StructureView::evaluate(&candles, cfg.struct_lookback, cfg.break_buffer, cfg.zone_buffer);

        let mut confirm_closes: Option<Vec<f64>> = None;
        let mut signals = Vec::new();
        for side in [Side::Long, Side::Short] {
            let candidate = scoring::score_side(
                symbol, side, &candles, &structure, &flow, &book, segment, thresholds, params,
            );
            let Some(signal) = candidate else { continue };

            if side == Side::Short {
                if let Some(r) = regime {
                    if r != Regime::Bearish {
                        log_event(
                            Level::Debug,
                            "scanner",
                            "regime_veto",
                            obj(&[("symbol", v_str(symbol)), ("regime", v_str(r.as_str()))]),
                        );
                        continue;
                    }
                }
            }

            if cfg.require_trend_confirm {
                if confirm_closes.is_none() {
                    let lower = self
                        .data
                        .candles(symbol, &cfg.confirm_timeframe, cfg.candle_limit)
                        .await?;
                    confirm_closes = Some(lower.iter().map(|c| c.close).collect());
                }
                let closes = confirm_closes.as_deref().unwrap_or(&[]);
                if !scoring::trend_confirms(closes, side, cfg.max_recent_change_pct) {
                    log_event(
                        Level::Debug,
                        "scanner",
                        "trend_veto",
                        obj(&[("symbol", v_str(symbol)), ("side", v_str(side.as_str()))]),
                    );
                    continue;
                }
            }

            signals.push(signal);
        }
        Ok(signals)
    }

    async fn reference_summaries(&self) -> Vec<report::MarketSummary> {
        let mut summaries = Vec::new();
        for symbol in &self.cfg.reference_symbols {
            let candles = match self
                .data
                .candles(symbol, &self.cfg.timeframe, self.cfg.candle_limit)
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    log_event(
                        Level::Warn,
                        "scanner",
                        "reference_unavailable",
                        obj(&[("symbol", v_str(symbol)), ("error", v_str(&e.to_string()))]),
                    );
                    continue;
                }
            };
            let flow = match self
                .data
                .recent_trades(symbol, self.cfg.trades_limit, self.cfg.trade_max_age_secs)
                .await
            {
                Ok(trades) if !trades.is_empty() => {
                    let segment = self
                        .data
                        .market_cap_segment(symbol)
                        .await
                        .unwrap_or(crate::market::MarketCapSegment::Micro);
                    Some(orderflow::classify(&trades, self.cfg.thresholds.for_segment(segment)))
                }
                _ => None,
            };
            if let Some(summary) = report::summarize_reference(symbol, &candles, flow) {
                summaries.push(summary);
            }
        }
        summaries
    }

    async fn market_regime(&self) -> Option<Regime> {
        if !self.cfg.require_bear_regime_for_shorts {
            return None;
        }
        let candles: Vec<Candle> = self
            .data
            .candles(&self.cfg.regime_symbol, &self.cfg.confirm_timeframe, 120)
            .await
            .unwrap_or_default();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let regime = classify_regime(&closes);
        log_event(
            Level::Info,
            "scanner",
            "market_regime",
            obj(&[
                ("symbol", v_str(&self.cfg.regime_symbol)),
                ("regime", v_str(regime.as_str())),
            ]),
        );
        Some(regime)
    }
}
