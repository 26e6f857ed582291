// ===============================
// src/notify.rs (Telegram dispatcher)
// ===============================
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::format::to_plain;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery timed out")]
    Timeout,
    #[error("channel answered {code}: {body}")]
    Status { code: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatting { Plain, Rich }

/// Best-effort delivery: one attempt, bounded by a timeout, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError>;
}

pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    formatting: Formatting,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, bot_token: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            formatting: Formatting::Rich,
            timeout,
        }
    }

    pub fn with_formatting(mut self, formatting: Formatting) -> Self {
        self.formatting = formatting;
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = match self.formatting {
            Formatting::Rich => text.to_string(),
            Formatting::Plain => to_plain(text),
        };
        let mut form = vec![("chat_id", destination), ("text", body.as_str())];
        if self.formatting == Formatting::Rich {
            form.push(("parse_mode", "HTML"));
        }

        let resp = self.http.post(url).form(&form).timeout(self.timeout).send().await;

        match resp {
            Ok(rsp) if rsp.status().is_success() => {
                info!(chat_id = %destination, "notification sent");
                Ok(())
            }
            Ok(rsp) => {
                let code = rsp.status();
                let body = rsp.text().await.unwrap_or_default();
                error!(%code, %body, "notification rejected");
                Err(DeliveryError::Status { code: code.as_u16(), body })
            }
            Err(e) if e.is_timeout() => {
                error!(chat_id = %destination, "notification timed out");
                Err(DeliveryError::Timeout)
            }
            Err(e) => {
                error!(?e, "notification send err");
                Err(DeliveryError::Transport(e.to_string()))
            }
        }
    }
}

/// Dry-run channel: writes the message to the log instead of sending it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: &str, text: &str) -> Result<(), DeliveryError> {
        info!(chat_id = %destination, "dry-run notification:\n{text}");
        Ok(())
    }
}
