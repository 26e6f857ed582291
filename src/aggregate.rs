// ===============================
// src/aggregate.rs
// ===============================
use thiserror::Error;

use crate::domain::{Deal, DealEntry, Ticket, TradeSummary};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("position {0} closed but no deal history found")]
    NoHistory(Ticket),
    #[error("position {0} has no opening or no closing leg")]
    MalformedPosition(Ticket),
}

/// Folds the deals of one closed position into a single summary.
///
/// Volume counts opening legs only; profit sums every deal so fees booked on the
/// opening leg are included. Leg selection goes by timestamp; ties keep venue order.
pub fn aggregate(ticket: Ticket, deals: Option<&[Deal]>) -> Result<TradeSummary, AggregationError> {
    let deals = match deals {
        Some(d) if !d.is_empty() => d,
        _ => return Err(AggregationError::NoHistory(ticket)),
    };

    let first_open = deals
        .iter()
        .filter(|d| d.entry == DealEntry::Opening)
        .min_by_key(|d| d.time);
    // max_by_key keeps the last of equal maxima, i.e. the later one in venue order
    let last_close = deals
        .iter()
        .filter(|d| d.entry.is_exit())
        .max_by_key(|d| d.time);

    let (first_open, last_close) = match (first_open, last_close) {
        (Some(o), Some(c)) => (o.clone(), c.clone()),
        _ => return Err(AggregationError::MalformedPosition(ticket)),
    };

    let total_volume = deals
        .iter()
        .filter(|d| d.entry == DealEntry::Opening)
        .map(|d| d.volume)
        .sum();
    let total_profit = deals.iter().map(|d| d.profit).sum();
    let total_commission = deals.iter().map(|d| d.commission).sum();
    let total_swap = deals.iter().map(|d| d.swap).sum();

    Ok(TradeSummary {
        ticket,
        symbol: first_open.symbol.clone(),
        total_volume,
        total_profit,
        total_commission,
        total_swap,
        first_open,
        last_close,
    })
}
