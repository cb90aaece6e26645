//! Outbound alert channels.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::exchange::Notifier;
use crate::logging::{log_event, obj, v_num, Level};

/// Telegram bot sendMessage sink. Markdown body, 10s timeout.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, token, chat_id })
    }

    /// Builds the configured notifier: Telegram when credentials are present,
    /// stdout otherwise (local runs, CI).
    pub fn from_config(cfg: &Config) -> Result<Box<dyn Notifier>> {
        match (&cfg.telegram_token, &cfg.telegram_chat_id) {
            (Some(token), Some(chat_id)) => {
                Ok(Box::new(Self::new(token.clone(), chat_id.clone())?))
            }
            _ => Ok(Box::new(StdoutNotifier)),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": message,
                "parse_mode": "Markdown",
            }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("telegram sendMessage {}: {}", status, body));
        }
        log_event(
            Level::Info,
            "notify",
            "sent",
            obj(&[("bytes", v_num(message.len() as f64))]),
        );
        Ok(())
    }
}

/// Fallback sink when no Telegram credentials are configured: print the
/// message so cron mail / journald still captures it.
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        println!("--- alert ---");
        println!("{}", message);
        println!("-------------");
        Ok(())
    }
}
