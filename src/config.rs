// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : closed_trade_notifier — closed-position reporter for a trading account
Module  : config.rs
Version : 0.1.0
License : MIT

Summary : Polls the open positions of one trading account, detects positions
          that closed since the last poll, rebuilds their result from the deal
          history and posts a report to a Telegram chat.
=============================================================================
*/
use std::time::Duration;

use chrono::FixedOffset;
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use thiserror::Error;

use crate::domain::Credentials;
use crate::format::NumberLocale;
use crate::jalali::parse_offset;

/// Where positions and deals come from
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VenueMode {
    /// In-process simulated account
    Mock,
    /// Real terminal behind the HTTP bridge
    Bridge,
}

impl VenueMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueMode::Mock => "mock",
            VenueMode::Bridge => "bridge",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required in bridge mode")]
    Missing(&'static str),
    #[error("invalid DISPLAY_UTC_OFFSET {0:?} (expected e.g. +03:30)")]
    Offset(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Clone, Debug, Parser)]
#[command(name = "closed_trade_notifier", version, about = "Report closed positions to Telegram")]
pub struct Args {
    // venue
    #[arg(long, env = "VENUE_MODE", value_enum, default_value = "mock")]
    pub venue_mode: VenueMode,
    #[arg(long, env = "VENUE_LOGIN", default_value_t = 0)]
    pub venue_login: u64,
    #[arg(long, env = "VENUE_PASSWORD", default_value = "", hide_env_values = true)]
    pub venue_password: String,
    #[arg(long, env = "VENUE_SERVER", default_value = "")]
    pub venue_server: String,

    // terminal bridge
    #[arg(long, env = "BRIDGE_URL", default_value = "http://127.0.0.1:8228/")]
    pub bridge_url: String,
    #[arg(long, env = "BRIDGE_API_KEY", default_value = "", hide_env_values = true)]
    pub bridge_api_key: String,
    #[arg(long, env = "BRIDGE_API_SECRET", default_value = "", hide_env_values = true)]
    pub bridge_api_secret: String,
    #[arg(long, env = "BRIDGE_TIMEOUT_SECS", default_value_t = 15)]
    pub bridge_timeout_secs: u64,

    // mock venue
    /// Comma separated symbols the simulated account trades
    #[arg(long, env = "MOCK_SYMBOLS", value_delimiter = ',', default_value = "EURUSD,GBPUSD,USDJPY")]
    pub mock_symbols: Vec<String>,
    #[arg(long, env = "MOCK_MAX_OPEN", default_value_t = 3)]
    pub mock_max_open: usize,

    // loop
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,
    /// Wait before the first history query of a cycle with closures
    #[arg(long, env = "SETTLE_DELAY_SECS", default_value_t = 3)]
    pub settle_delay_secs: u64,

    // telegram
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", default_value = "", hide_env_values = true)]
    pub telegram_bot_token: String,
    #[arg(long, env = "TELEGRAM_CHAT_ID", default_value = "")]
    pub telegram_chat_id: String,
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,
    #[arg(long, env = "NOTIFY_TIMEOUT_SECS", default_value_t = 10)]
    pub notify_timeout_secs: u64,
    /// Send plain text instead of HTML
    #[arg(long, env = "TELEGRAM_PLAIN", default_value_t = false)]
    pub telegram_plain: bool,

    // connectivity probe
    #[arg(long, env = "PROBE_URL", default_value = "https://www.google.com")]
    pub probe_url: String,
    #[arg(long, env = "PROBE_TIMEOUT_SECS", default_value_t = 5)]
    pub probe_timeout_secs: u64,

    // rendering
    #[arg(long, env = "DISPLAY_UTC_OFFSET", default_value = "+03:30", allow_hyphen_values = true)]
    pub display_utc_offset: String,
    #[arg(long, env = "FALLBACK_CURRENCY", default_value = "USD")]
    pub fallback_currency: String,
    #[arg(long, env = "NUMBER_GROUP_SEP", default_value = ".")]
    pub number_group_sep: String,
    #[arg(long, env = "NUMBER_DECIMAL_SEP", default_value = ",")]
    pub number_decimal_sep: String,

    // files/metrics
    #[arg(long, env = "METRICS_PORT", default_value_t = 9898)]
    pub metrics_port: u16,
    #[arg(long, env = "RECORD_FILE")]
    pub record_file: Option<String>,
}

impl Args {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            login: self.venue_login,
            password: self.venue_password.clone(),
            server: self.venue_server.clone(),
        }
    }

    pub fn display_offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_offset(&self.display_utc_offset).ok_or_else(|| ConfigError::Offset(self.display_utc_offset.clone()))
    }

    pub fn locale(&self) -> NumberLocale {
        NumberLocale { group_sep: self.number_group_sep.clone(), decimal_sep: self.number_decimal_sep.clone() }
    }

    pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs) }
    pub fn settle_delay(&self) -> Duration { Duration::from_secs(self.settle_delay_secs) }
    pub fn notify_timeout(&self) -> Duration { Duration::from_secs(self.notify_timeout_secs) }
    pub fn probe_timeout(&self) -> Duration { Duration::from_secs(self.probe_timeout_secs) }
    pub fn bridge_timeout(&self) -> Duration { Duration::from_secs(self.bridge_timeout_secs) }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Zero("POLL_INTERVAL_SECS"));
        }
        if self.notify_timeout_secs == 0 {
            return Err(ConfigError::Zero("NOTIFY_TIMEOUT_SECS"));
        }
        self.display_offset()?;
        if self.venue_mode == VenueMode::Bridge {
            for (name, val) in [
                ("BRIDGE_API_KEY", &self.bridge_api_key),
                ("BRIDGE_API_SECRET", &self.bridge_api_secret),
                ("TELEGRAM_BOT_TOKEN", &self.telegram_bot_token),
                ("TELEGRAM_CHAT_ID", &self.telegram_chat_id),
            ] {
                if val.trim().is_empty() {
                    return Err(ConfigError::Missing(name));
                }
            }
            if self.venue_login == 0 {
                return Err(ConfigError::Missing("VENUE_LOGIN"));
            }
        }
        Ok(())
    }
}

pub fn load() -> Args {
    // .env first, so clap sees its values as environment
    let _ = dotenv();
    Args::parse()
}
