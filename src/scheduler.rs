// ===============================
// src/scheduler.rs (poll loop)
// ===============================
//
// One cycle = probe -> list -> diff -> per closed ticket: history -> aggregate
// -> format -> send. Cycles never overlap; a slow cycle only delays the next tick.
//
use std::sync::Arc;
use std::time::Instant;

use chrono::{FixedOffset, Utc};
use tokio::{
    sync::{mpsc, watch},
    time::{sleep, Duration},
};
use tracing::{debug, error, info, warn};

use crate::aggregate::{aggregate, AggregationError};
use crate::domain::{Event, Ticket};
use crate::format::{format_error, format_summary, FormatCtx, NumberLocale};
use crate::metrics::{AGGREGATION_ERRORS, CLOSURES, CYCLES, CYCLE_SECONDS, NOTIFICATIONS, OPEN_POSITIONS};
use crate::notify::Notifier;
use crate::probe::ConnectivityProbe;
use crate::reconcile::ReconciliationEngine;
use crate::venue::VenueClient;

#[derive(Debug, Clone)]
pub struct SchedulerCfg {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub destination: String,
    pub fallback_currency: String,
    pub locale: NumberLocale,
    pub offset: FixedOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Offline,
    VenueUnavailable,
    Completed { closed: usize, delivered: usize, failed: usize },
}

impl CycleOutcome {
    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Offline => "offline",
            CycleOutcome::VenueUnavailable => "venue_unavailable",
            CycleOutcome::Completed { .. } => "completed",
        }
    }
}

pub struct Scheduler {
    venue: Arc<dyn VenueClient>,
    probe: Arc<dyn ConnectivityProbe>,
    notifier: Arc<dyn Notifier>,
    engine: ReconciliationEngine,
    cfg: SchedulerCfg,
    rec_tx: Option<mpsc::Sender<Event>>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        venue: Arc<dyn VenueClient>,
        probe: Arc<dyn ConnectivityProbe>,
        notifier: Arc<dyn Notifier>,
        cfg: SchedulerCfg,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { venue, probe, notifier, engine: ReconciliationEngine::new(), cfg, rec_tx: None, shutdown }
    }

    pub fn with_recorder(mut self, tx: mpsc::Sender<Event>) -> Self {
        self.rec_tx = Some(tx);
        self
    }

    fn record(&self, ev: Event) {
        if let Some(tx) = &self.rec_tx {
            let _ = tx.try_send(ev);
        }
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs cycles until shutdown is signalled. Shutdown is honoured between
    /// cycles and between tickets, never in the middle of one ticket.
    pub async fn run(mut self) {
        info!(
            venue = self.venue.name(),
            interval_s = self.cfg.poll_interval.as_secs(),
            "scheduler started"
        );
        let mut shutdown = self.shutdown.clone();
        loop {
            if self.stopping() {
                break;
            }
            let started = Instant::now();
            let outcome = self.run_cycle().await;
            CYCLE_SECONDS.observe(started.elapsed().as_secs_f64());
            CYCLES.with_label_values(&[outcome.label()]).inc();

            tokio::select! {
                _ = sleep(self.cfg.poll_interval) => {}
                res = shutdown.changed() => {
                    // sender gone: nobody can stop us any more, treat as stop
                    if res.is_err() {
                        break;
                    }
                }
            }
        }
        info!("scheduler stopped");
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if !self.probe.is_online().await {
            warn!("offline, skipping cycle");
            self.record(Event::Skipped { ts: Utc::now().timestamp(), reason: "offline".into() });
            return CycleOutcome::Offline;
        }

        let positions = match self.venue.list_open_positions().await {
            Ok(p) => p,
            Err(e) => {
                warn!(%e, last_error = %self.venue.last_error_description(), "listing positions failed, skipping cycle");
                self.record(Event::Skipped { ts: Utc::now().timestamp(), reason: e.to_string() });
                return CycleOutcome::VenueUnavailable;
            }
        };

        for p in &positions {
            debug!(
                ticket = p.ticket,
                symbol = %p.symbol,
                volume = p.volume,
                open_price = p.open_price,
                kind = ?p.kind,
                new = !self.engine.is_open(p.ticket),
                "open"
            );
        }
        let closed = self.engine.observe_cycle(positions.iter().map(|p| p.ticket));
        OPEN_POSITIONS.set(self.engine.open_count() as i64);
        self.record(Event::Cycle { ts: Utc::now().timestamp(), open: self.engine.open_count(), closed: closed.clone() });

        if closed.is_empty() {
            return CycleOutcome::Completed { closed: 0, delivered: 0, failed: 0 };
        }
        CLOSURES.inc_by(closed.len() as u64);
        info!(tickets = ?closed, "positions closed");

        // history may lag the closure a little
        if !self.cfg.settle_delay.is_zero() {
            sleep(self.cfg.settle_delay).await;
        }
        let ctx = FormatCtx {
            currency: self.account_currency().await,
            locale: self.cfg.locale.clone(),
            offset: self.cfg.offset,
        };

        let (mut delivered, mut failed) = (0, 0);
        for ticket in &closed {
            if self.stopping() {
                warn!(ticket, "shutdown requested, leaving remaining closures");
                break;
            }
            if self.process_ticket(*ticket, &ctx).await {
                delivered += 1;
            } else {
                failed += 1;
            }
        }
        CycleOutcome::Completed { closed: closed.len(), delivered, failed }
    }

    async fn account_currency(&self) -> String {
        match self.venue.fetch_account_metadata().await {
            Ok(Some(acct)) if !acct.currency.trim().is_empty() => acct.currency,
            Ok(_) => self.cfg.fallback_currency.clone(),
            Err(e) => {
                warn!(%e, fallback = %self.cfg.fallback_currency, "account metadata unavailable");
                self.cfg.fallback_currency.clone()
            }
        }
    }

    /// Full pipeline for one ticket. Returns whether a message went out.
    async fn process_ticket(&self, ticket: Ticket, ctx: &FormatCtx) -> bool {
        let deals = match self.venue.fetch_deal_history(ticket).await {
            Ok(d) => d,
            Err(e) => {
                warn!(ticket, %e, last_error = %self.venue.last_error_description(), "history query failed");
                None
            }
        };

        let (kind, text) = match aggregate(ticket, deals.as_deref()) {
            Ok(summary) => {
                info!(
                    ticket,
                    symbol = %summary.symbol,
                    volume = summary.total_volume,
                    profit = summary.total_profit,
                    commission = summary.total_commission,
                    swap = summary.total_swap,
                    comment = %summary.last_close.comment,
                    "trade summarised"
                );
                let text = format_summary(&summary, ctx);
                self.record(Event::Closed(summary));
                ("summary", text)
            }
            Err(e) => {
                let label = match e {
                    AggregationError::NoHistory(_) => "no_history",
                    AggregationError::MalformedPosition(_) => "malformed",
                };
                warn!(ticket, %e, "cannot summarise closed position");
                AGGREGATION_ERRORS.with_label_values(&[label]).inc();
                ("error", format_error(ticket, &e))
            }
        };

        match self.notifier.send(&self.cfg.destination, &text).await {
            Ok(()) => {
                NOTIFICATIONS.with_label_values(&[kind, "sent"]).inc();
                self.record(Event::Delivery { ts: Utc::now().timestamp(), ticket, ok: true, detail: None });
                true
            }
            Err(e) => {
                error!(ticket, %e, "notification dropped");
                NOTIFICATIONS.with_label_values(&[kind, "failed"]).inc();
                self.record(Event::Delivery { ts: Utc::now().timestamp(), ticket, ok: false, detail: Some(e.to_string()) });
                false
            }
        }
    }

    #[cfg(test)]
    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }
}
