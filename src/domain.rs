// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};

/// Venue-side position identifier.
pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionKind { Buy, Sell, Other(i32) }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition { pub ticket: Ticket, pub symbol: String, pub volume: f64, pub open_price: f64, pub kind: PositionKind }

/// Direction of a deal relative to the position it belongs to.
/// `Other` deals belong to neither leg but still carry profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealEntry { Opening, Closing, Reversal, Other(i32) }

impl DealEntry {
    pub fn is_exit(&self) -> bool { matches!(self, DealEntry::Closing | DealEntry::Reversal) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub ticket: u64,
    pub position_id: Ticket,
    pub time: i64,
    pub price: f64,
    pub volume: f64,
    pub profit: f64,
    pub commission: f64,
    pub swap: f64,
    pub symbol: String,
    pub comment: String,
    pub entry: DealEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo { pub login: u64, pub currency: String, pub balance: f64, pub equity: f64, pub server: String }

#[derive(Debug, Clone)]
pub struct Credentials { pub login: u64, pub password: String, pub server: String }

/// Outcome of one closed position, rebuilt from its deals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub ticket: Ticket,
    pub symbol: String,
    pub total_volume: f64,
    pub total_profit: f64,
    pub total_commission: f64,
    pub total_swap: f64,
    pub first_open: Deal,
    pub last_close: Deal,
}

impl TradeSummary {
    /// Seconds between the first opening leg and the last exit leg. Negative on skewed data.
    pub fn duration_secs(&self) -> i64 { self.last_close.time - self.first_open.time }
}

// Audit events (JSONL recorder)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Cycle { ts: i64, open: usize, closed: Vec<Ticket> },
    Skipped { ts: i64, reason: String },
    Closed(TradeSummary),
    Delivery { ts: i64, ticket: Ticket, ok: bool, detail: Option<String> },
}
