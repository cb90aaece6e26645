//! Structured logging: one JSON object per line on stdout.
//!
//! Scans run unattended under cron, so log output is the only operational
//! surface; every event carries a timestamp, level, and component for
//! downstream filtering.

use chrono::Utc;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// RFC3339 timestamp with millisecond precision.
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

const REDACTED_KEYS: [&str; 3] = ["token", "telegram_token", "chat_id"];

fn sanitize(mut fields: Map<String, Value>) -> Map<String, Value> {
    for key in REDACTED_KEYS {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), Value::String("[REDACTED]".to_string()));
        }
    }
    fields
}

/// Emit one structured event, filtered by the LOG_LEVEL env var.
pub fn log_event(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() {
        return;
    }
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("lvl".to_string(), json!(level.as_str()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    for (k, v) in sanitize(fields) {
        entry.insert(k, v);
    }
    println!("{}", Value::Object(entry));
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("symbol", v_str("BTC-USDT")), ("delta", v_num(1.5))]);
        assert_eq!(m.get("symbol").unwrap(), "BTC-USDT");
        assert_eq!(m.get("delta").unwrap(), 1.5);
    }

    #[test]
    fn test_sanitize_redacts_credentials() {
        let m = sanitize(obj(&[("token", v_str("secret")), ("symbol", v_str("X"))]));
        assert_eq!(m.get("token").unwrap(), "[REDACTED]");
        assert_eq!(m.get("symbol").unwrap(), "X");
    }
}
