//! Per-symbol alert cooldown, persisted across scan invocations.

use anyhow::Result;
use rusqlite::{params, Connection};

/// symbol -> last alert timestamp, with TTL eviction. The only persistent
/// state in the scanner; entries older than the TTL are pruned when the
/// store is opened.
pub struct CooldownStore {
    conn: Connection,
    ttl_ms: i64,
}

impl CooldownStore {
    pub fn open(path: &str, ttl_secs: u64, now_ms: i64) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_conn(conn, ttl_secs, now_ms)
    }

    pub fn open_in_memory(ttl_secs: u64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_conn(conn, ttl_secs, 0)
    }

    fn from_conn(conn: Connection, ttl_secs: u64, now_ms: i64) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cooldowns (
                symbol TEXT PRIMARY KEY,
                last_alert_ms INTEGER NOT NULL
            );",
        )?;
        let mut store = Self { conn, ttl_ms: ttl_secs as i64 * 1000 };
        store.prune(now_ms)?;
        Ok(store)
    }

    /// True while a non-expired entry exists for the symbol.
    pub fn is_active(&self, symbol: &str, now_ms: i64) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT last_alert_ms FROM cooldowns WHERE symbol = ?1")?;
        let last: Option<i64> = stmt
            .query_row(params![symbol], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(match last {
            Some(ts) => now_ms - ts < self.ttl_ms,
            None => false,
        })
    }

    pub fn record(&mut self, symbol: &str, now_ms: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cooldowns (symbol, last_alert_ms) VALUES (?1, ?2)
             ON CONFLICT(symbol) DO UPDATE SET last_alert_ms = ?2",
            params![symbol, now_ms],
        )?;
        Ok(())
    }

    pub fn prune(&mut self, now_ms: i64) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM cooldowns WHERE last_alert_ms < ?1",
            params![now_ms - self.ttl_ms],
        )?;
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cooldowns", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
