use std::sync::Arc;

use anyhow::Result;

use flowscan::config::Config;
use flowscan::cooldown::CooldownStore;
use flowscan::exchange::okx::OkxMarketData;
use flowscan::logging::{log_event, now_ms, obj, v_num, v_str, Level};
use flowscan::notify::TelegramNotifier;
use flowscan::scanner::Scanner;

// One invocation = one full scan of the universe; scheduling is cron's job.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log_event(
        Level::Info,
        "main",
        "starting",
        obj(&[
            ("timeframe", v_str(&cfg.timeframe)),
            ("top_limit", v_num(cfg.top_limit as f64)),
            ("concurrency", v_num(cfg.concurrency as f64)),
            ("cooldown_ttl_secs", v_num(cfg.cooldown_ttl_secs as f64)),
        ]),
    );

    let data = Arc::new(OkxMarketData::new(&cfg)?);
    let notifier = TelegramNotifier::from_config(&cfg)?;
    let store = CooldownStore::open(&cfg.cooldown_path, cfg.cooldown_ttl_secs, now_ms())?;

    let scanner = Scanner::new(cfg, data, notifier, store);
    let outcome = scanner.run().await?;

    log_event(
        Level::Info,
        "main",
        "done",
        obj(&[
            ("signals", v_num(outcome.signals.len() as f64)),
            ("notified", serde_json::json!(outcome.notified)),
        ]),
    );
    Ok(())
}
