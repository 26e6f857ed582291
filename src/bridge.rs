// ===============================
// src/bridge.rs
// ===============================
//
// Signing helpers + wire models for the terminal bridge REST API.
//
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::domain::{AccountInfo, Deal, DealEntry, OpenPosition, PositionKind};

pub fn timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

pub fn sign_query(secret: &str, query: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC key");
    mac.update(query.as_bytes());
    let sig = mac.finalize().into_bytes();
    hex::encode(sig)
}

/// `k=v&k=v` with values url-encoded, in the given order.
pub fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// ---- Wire models ----
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub login: u64,
    pub password: &'a str,
    pub server: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Error envelope returned with non-2xx answers.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct WirePosition {
    pub ticket: u64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub price_open: f64,
    #[serde(rename = "type", default)]
    pub kind: i32, // 0 buy, 1 sell, other codes pass through
}

impl From<WirePosition> for OpenPosition {
    fn from(w: WirePosition) -> Self {
        let kind = match w.kind {
            0 => PositionKind::Buy,
            1 => PositionKind::Sell,
            other => PositionKind::Other(other),
        };
        OpenPosition { ticket: w.ticket, symbol: w.symbol, volume: w.volume, open_price: w.price_open, kind }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireDeal {
    pub ticket: u64,
    pub position_id: u64,
    pub time: i64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub swap: f64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub comment: String,
    pub entry: i32, // 0 in, 1 out, 2 in/out (reversal), 3 out by opposite position
}

impl From<WireDeal> for Deal {
    fn from(w: WireDeal) -> Self {
        let entry = match w.entry {
            0 => DealEntry::Opening,
            1 | 3 => DealEntry::Closing,
            2 => DealEntry::Reversal,
            other => DealEntry::Other(other),
        };
        Deal {
            ticket: w.ticket,
            position_id: w.position_id,
            time: w.time,
            price: w.price,
            volume: w.volume,
            profit: w.profit,
            commission: w.commission,
            swap: w.swap,
            symbol: w.symbol,
            comment: w.comment,
            entry,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireAccount {
    #[serde(default)]
    pub login: u64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub equity: f64,
    #[serde(default)]
    pub server: String,
}

impl From<WireAccount> for AccountInfo {
    fn from(w: WireAccount) -> Self {
        AccountInfo { login: w.login, currency: w.currency, balance: w.balance, equity: w.equity, server: w.server }
    }
}
