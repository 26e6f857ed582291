// ===============================
// src/venue_mock.rs (simulated account)
// ===============================
//
// Random-walk account for dry runs:
// - every `list_open_positions` call advances the simulation one step
// - positions open at random, some with a second partial fill
// - positions close after a random number of steps (sometimes in two parts)
// - every fill is booked as a deal so history queries behave like a real terminal
//
use std::sync::Mutex;

use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

use crate::domain::{AccountInfo, Credentials, Deal, DealEntry, OpenPosition, PositionKind, Ticket};
use crate::venue::{VenueClient, VenueError, VenueResult};

const CONTRACT_SIZE: f64 = 100_000.0;
const COMMISSION_PER_LOT: f64 = 7.0;

#[derive(Debug, Clone)]
struct SimPosition {
    ticket: Ticket,
    symbol: String,
    side: PositionKind,
    volume: f64,
    open_price: f64,
    close_at_step: u64,
}

#[derive(Debug, Default)]
struct SimState {
    authenticated: bool,
    step: u64,
    next_ticket: u64,
    next_deal: u64,
    prices: HashMap<String, f64>,
    open: Vec<SimPosition>,
    deals: HashMap<Ticket, Vec<Deal>>,
    balance: f64,
}

pub struct MockVenue {
    symbols: Vec<String>,
    max_open: usize,
    currency: String,
    state: Mutex<SimState>,
    last_error: Mutex<String>,
}

impl MockVenue {
    pub fn new(symbols: Vec<String>, max_open: usize, currency: &str) -> Self {
        let mut prices = HashMap::new();
        for (i, s) in symbols.iter().enumerate() {
            prices.insert(s.clone(), 1.1 + 0.1 * i as f64);
        }
        Self {
            symbols,
            max_open,
            currency: currency.to_string(),
            state: Mutex::new(SimState {
                next_ticket: 1_000_000,
                next_deal: 5_000_000,
                prices,
                balance: 10_000.0,
                ..Default::default()
            }),
            last_error: Mutex::new(String::new()),
        }
    }

    fn fail(&self, e: VenueError) -> VenueError {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = e.to_string();
        }
        e
    }

    fn book(st: &mut SimState, pos: &SimPosition, entry: DealEntry, volume: f64, price: f64, profit: f64) {
        st.next_deal += 1;
        let commission = -COMMISSION_PER_LOT * volume / 2.0;
        st.balance += profit + commission;
        let deal = Deal {
            ticket: st.next_deal,
            position_id: pos.ticket,
            time: Utc::now().timestamp(),
            price,
            volume,
            profit,
            commission,
            swap: 0.0,
            symbol: pos.symbol.clone(),
            comment: String::new(),
            entry,
        };
        st.deals.entry(pos.ticket).or_default().push(deal);
    }

    fn advance(&self, st: &mut SimState) {
        let mut rng = rand::thread_rng();
        st.step += 1;

        for px in st.prices.values_mut() {
            let step: f64 = rng.gen_range(-0.0008..=0.0008);
            *px = (*px + step).max(0.5);
        }

        // closes
        let step = st.step;
        let (due, keep): (Vec<SimPosition>, Vec<SimPosition>) =
            std::mem::take(&mut st.open).into_iter().partition(|p| p.close_at_step <= step);
        st.open = keep;
        for pos in due {
            let px = st.prices.get(&pos.symbol).copied().unwrap_or(pos.open_price);
            let dir = if pos.side == PositionKind::Sell { -1.0 } else { 1.0 };
            let pnl = |vol: f64| ((px - pos.open_price) * dir * vol * CONTRACT_SIZE * 100.0).round() / 100.0;
            if rng.gen_bool(0.3) && pos.volume >= 0.02 {
                let first = (pos.volume / 2.0 * 100.0).round() / 100.0;
                let rest = ((pos.volume - first) * 100.0).round() / 100.0;
                Self::book(st, &pos, DealEntry::Closing, first, px, pnl(first));
                Self::book(st, &pos, DealEntry::Closing, rest, px, pnl(rest));
            } else {
                Self::book(st, &pos, DealEntry::Closing, pos.volume, px, pnl(pos.volume));
            }
            info!(ticket = pos.ticket, symbol = %pos.symbol, "mock: position closed");
        }

        // opens
        if st.open.len() < self.max_open && !self.symbols.is_empty() && rng.gen_bool(0.4) {
            let symbol = self.symbols[rng.gen_range(0..self.symbols.len())].clone();
            let px = st.prices.get(&symbol).copied().unwrap_or(1.0);
            st.next_ticket += 1;
            let side = if rng.gen_bool(0.5) { PositionKind::Buy } else { PositionKind::Sell };
            let lots = rng.gen_range(1..=5) as f64 / 100.0;
            let mut pos = SimPosition {
                ticket: st.next_ticket,
                symbol,
                side,
                volume: lots,
                open_price: px,
                close_at_step: step + rng.gen_range(2..=8),
            };
            Self::book(st, &pos, DealEntry::Opening, lots, px, 0.0);
            if rng.gen_bool(0.25) {
                // second partial fill at the same price keeps open_price exact
                Self::book(st, &pos, DealEntry::Opening, lots, px, 0.0);
                pos.volume = ((pos.volume + lots) * 100.0).round() / 100.0;
            }
            info!(ticket = pos.ticket, symbol = %pos.symbol, volume = pos.volume, "mock: position opened");
            st.open.push(pos);
        }
        debug!(step = st.step, open = st.open.len(), "mock: step");
    }
}

#[async_trait]
impl VenueClient for MockVenue {
    fn name(&self) -> &str {
        "mock"
    }

    async fn authenticate(&self, creds: &Credentials) -> bool {
        match self.state.lock() {
            Ok(mut st) => {
                st.authenticated = true;
                info!(login = creds.login, server = %creds.server, "mock: login ok");
                true
            }
            Err(_) => false,
        }
    }

    async fn list_open_positions(&self) -> VenueResult<Vec<OpenPosition>> {
        let mut st = self.state.lock().map_err(|e| self.fail(VenueError::Transport(e.to_string())))?;
        if !st.authenticated {
            return Err(self.fail(VenueError::NotAuthenticated));
        }
        self.advance(&mut st);
        Ok(st
            .open
            .iter()
            .map(|p| OpenPosition {
                ticket: p.ticket,
                symbol: p.symbol.clone(),
                volume: p.volume,
                open_price: p.open_price,
                kind: p.side,
            })
            .collect())
    }

    async fn fetch_deal_history(&self, ticket: Ticket) -> VenueResult<Option<Vec<Deal>>> {
        let st = self.state.lock().map_err(|e| self.fail(VenueError::Transport(e.to_string())))?;
        if !st.authenticated {
            return Err(self.fail(VenueError::NotAuthenticated));
        }
        Ok(st.deals.get(&ticket).cloned())
    }

    async fn fetch_account_metadata(&self) -> VenueResult<Option<AccountInfo>> {
        let st = self.state.lock().map_err(|e| self.fail(VenueError::Transport(e.to_string())))?;
        if !st.authenticated {
            return Err(self.fail(VenueError::NotAuthenticated));
        }
        Ok(Some(AccountInfo {
            login: 0,
            currency: self.currency.clone(),
            balance: st.balance,
            equity: st.balance,
            server: "mock".into(),
        }))
    }

    fn last_error_description(&self) -> String {
        self.last_error.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;

    fn creds() -> Credentials {
        Credentials { login: 1, password: String::new(), server: "mock".into() }
    }

    #[tokio::test]
    async fn requires_login() {
        let v = MockVenue::new(vec!["EURUSD".into()], 3, "USD");
        assert!(matches!(v.list_open_positions().await, Err(VenueError::NotAuthenticated)));
        assert_eq!(v.last_error_description(), "not authenticated");
    }

    #[tokio::test]
    async fn every_closed_position_has_consistent_history() {
        let v = MockVenue::new(vec!["EURUSD".into(), "GBPUSD".into()], 4, "USD");
        assert!(v.authenticate(&creds()).await);

        let mut seen: ahash::AHashSet<Ticket> = Default::default();
        for _ in 0..200 {
            for p in v.list_open_positions().await.expect("positions") {
                seen.insert(p.ticket);
            }
        }
        let open_now: ahash::AHashSet<Ticket> =
            v.list_open_positions().await.expect("positions").into_iter().map(|p| p.ticket).collect();

        for t in seen.difference(&open_now) {
            let deals = v.fetch_deal_history(*t).await.expect("ok");
            let s = aggregate(*t, deals.as_deref()).expect("well-formed");
            let closed_volume: f64 = deals
                .as_deref()
                .unwrap_or_default()
                .iter()
                .filter(|d| d.entry.is_exit())
                .map(|d| d.volume)
                .sum();
            assert!((s.total_volume - closed_volume).abs() < 1e-9);
            assert!(s.duration_secs() >= 0);
        }
        assert_eq!(v.fetch_account_metadata().await.expect("ok").expect("some").currency, "USD");
    }

    #[tokio::test]
    async fn unknown_ticket_has_no_history() {
        let v = MockVenue::new(vec!["EURUSD".into()], 1, "USD");
        v.authenticate(&creds()).await;
        assert!(v.fetch_deal_history(42).await.expect("ok").is_none());
    }
}
