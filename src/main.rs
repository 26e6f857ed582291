// ===============================
// src/main.rs
// ===============================
/*
 # dry run against the simulated account, messages only logged
 VENUE_MODE=mock POLL_INTERVAL_SECS=2 SETTLE_DELAY_SECS=0 cargo run

 # what the loop has been doing
 curl -s localhost:9898/metrics | egrep '^(cycles_total|closures_detected_total|notifications_total)'
*/
/*
=============================================================================
Project : closed_trade_notifier — closed-position reporter for a trading account
Module  : main.rs
Version : 0.1.0
License : MIT

Summary : Polls the open positions of one trading account, detects positions
          that closed since the last poll, rebuilds their result from the deal
          history and posts a report to a Telegram chat.
=============================================================================
*/
mod aggregate;
mod bridge;           // signer + wire models for the terminal bridge
mod config;
mod domain;
mod format;
mod jalali;
mod metrics;
mod notify;
mod probe;
mod reconcile;
mod recorder;
mod scheduler;
mod venue;
mod venue_bridge;     // real terminal over HTTP
mod venue_mock;       // simulated account

use std::sync::Arc;

use rand::Rng;
use tokio::{
    sync::{mpsc, watch},
    time::{sleep, Duration},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::VenueMode;
use crate::domain::{Credentials, Event};
use crate::notify::{Formatting, LogNotifier, Notifier, TelegramNotifier};
use crate::scheduler::{Scheduler, SchedulerCfg};
use crate::venue::VenueClient;

/// Logs in, retrying with exponential backoff + jitter until it works or we are told to stop.
async fn login(venue: &dyn VenueClient, creds: &Credentials, shutdown: &mut watch::Receiver<bool>) -> bool {
    let mut attempt: u32 = 0;
    loop {
        if venue.authenticate(creds).await {
            metrics::VENUE_LOGIN_ATTEMPTS.with_label_values(&["ok"]).inc();
            return true;
        }
        metrics::VENUE_LOGIN_ATTEMPTS.with_label_values(&["failed"]).inc();
        warn!(attempt, error = %venue.last_error_description(), "venue login failed");

        attempt = attempt.saturating_add(1);
        let shift = attempt.min(6);                  // 1..=6
        let base_ms = 500u64.saturating_mul(1 << shift); // 1s..32s
        let jitter = rand::thread_rng().gen_range(0..=250);
        tokio::select! {
            _ = sleep(Duration::from_millis(base_ms + jitter)) => {}
            _ = shutdown.changed() => return false,
        }
    }
}

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Config ----
    let args = config::load();
    if let Err(e) = args.validate() {
        error!(%e, "invalid configuration");
        std::process::exit(2);
    }
    let offset = match args.display_offset() {
        Ok(o) => o,
        Err(e) => {
            error!(%e, "invalid configuration");
            std::process::exit(2);
        }
    };

    // ---- Metrics ----
    metrics::init();
    metrics::serve_metrics(args.metrics_port);
    metrics::CONFIG_VENUE_MODE.with_label_values(&[args.venue_mode.as_str()]).set(1);
    metrics::CONFIG_POLL_INTERVAL.set(args.poll_interval_secs as i64);

    info!(
        venue_mode = %args.venue_mode.as_str(),
        login = args.venue_login,
        server = %args.venue_server,
        interval_s = args.poll_interval_secs,
        settle_s = args.settle_delay_secs,
        utc_offset = %args.display_utc_offset,
        dry_run = args.telegram_bot_token.is_empty(),
        "startup config"
    );

    // ---- Shutdown (Ctrl-C) ----
    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, finishing current ticket");
            let _ = stop_tx.send(true);
        }
        // keep the sender alive so receivers see the flag, not a closed channel
        std::future::pending::<()>().await;
    });

    // ---- Venue ----
    let venue: Arc<dyn VenueClient> = match args.venue_mode {
        VenueMode::Mock => Arc::new(venue_mock::MockVenue::new(
            args.mock_symbols.clone(),
            args.mock_max_open,
            &args.fallback_currency,
        )),
        VenueMode::Bridge => match venue_bridge::BridgeVenue::new(
            &args.bridge_url,
            &args.bridge_api_key,
            &args.bridge_api_secret,
            args.bridge_timeout(),
        ) {
            Ok(v) => Arc::new(v),
            Err(e) => {
                error!(%e, "cannot build bridge client");
                std::process::exit(2);
            }
        },
    };

    if !login(venue.as_ref(), &args.credentials(), &mut stop_rx).await {
        info!("stopped before login");
        return;
    }
    match venue.fetch_account_metadata().await {
        Ok(Some(acct)) => info!(
            login = acct.login,
            server = %acct.server,
            currency = %acct.currency,
            balance = acct.balance,
            equity = acct.equity,
            "account"
        ),
        Ok(None) => warn!("account metadata empty"),
        Err(e) => warn!(%e, "account metadata unavailable"),
    }

    // ---- Channel ----
    let notifier: Arc<dyn Notifier> = if args.telegram_bot_token.is_empty() {
        warn!("TELEGRAM_BOT_TOKEN not set, notifications are only logged");
        Arc::new(LogNotifier)
    } else {
        let formatting = if args.telegram_plain { Formatting::Plain } else { Formatting::Rich };
        Arc::new(
            TelegramNotifier::new(&args.telegram_api_url, &args.telegram_bot_token, args.notify_timeout())
                .with_formatting(formatting),
        )
    };
    let probe = Arc::new(probe::HttpProbe::new(&args.probe_url, args.probe_timeout()));

    // ---- Scheduler ----
    let cfg = SchedulerCfg {
        poll_interval: args.poll_interval(),
        settle_delay: args.settle_delay(),
        destination: args.telegram_chat_id.clone(),
        fallback_currency: args.fallback_currency.clone(),
        locale: args.locale(),
        offset,
    };
    let mut sched = Scheduler::new(venue, probe, notifier, cfg, stop_rx);

    // ---- Recorder (optional) ----
    if let Some(path) = args.record_file.clone() {
        let (rec_tx, rec_rx) = mpsc::channel::<Event>(1024);
        tokio::spawn(recorder::run(rec_rx, path));
        sched = sched.with_recorder(rec_tx);
    }

    sched.run().await;
}
