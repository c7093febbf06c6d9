//! Watch command
//!
//! Polls on the interval the reconciler asks for and prints one line per
//! update. Enter forces a refresh, Ctrl-C stops.
//!
//! ```text
//!   next_poll_at ─┐   Enter ─┐   display tick ─┐
//!                 ▼          ▼                 ▼
//!           begin_poll() ── false ─► skip   re-render when
//!                 │ true                    staleness flips
//!                 ▼
//!       spawn: fetch → reconcile → complete_poll(next_interval)
//! ```

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, Utc};
use quotabar_core::services::usage::{
    create_shared_state, ClaudeUsageProvider, DisplayModel, ReconcileOutcome, SharedPollingState,
    UsageProvider, UsageReconciler,
};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use super::Context;
use crate::output::{format_interval, print_display_error, print_info, styled_status, OutputFormat};

/// How often staleness is re-checked between polls
const DISPLAY_TICK_SECS: u64 = 30;

type SharedReconciler = Arc<Mutex<UsageReconciler>>;

#[derive(Debug, Serialize)]
struct WatchLine<'a> {
    at: chrono::DateTime<Utc>,
    status: String,
    next_poll_secs: u64,
    #[serde(flatten)]
    display: &'a DisplayModel,
}

pub async fn execute(ctx: &Context, polls: Option<u64>) -> Result<()> {
    let reconciler: SharedReconciler = Arc::new(Mutex::new(ctx.reconciler()?));
    let provider = Arc::new(ctx.provider());
    if !provider.is_available().await {
        log::debug!("[cli:watch] No credentials yet; polling anyway");
    }

    let initial = reconciler.lock().await.next_interval();
    let state = create_shared_state(initial);
    state.write().await.start();

    print_info(
        &format!(
            "Watching usage (base interval {}). Press Enter to refresh, Ctrl-C to quit.",
            format_interval(initial)
        ),
        ctx.quiet,
    );

    let (outcome_tx, mut outcome_rx) = mpsc::channel::<ReconcileOutcome>(4);
    let mut force_rx = spawn_stdin_reader();
    let mut display_tick = tokio::time::interval(Duration::from_secs(DISPLAY_TICK_SECS));
    display_tick.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut completed = 0u64;
    let mut last_stale = false;

    // First poll right away
    start_poll(&state, &provider, &reconciler, &outcome_tx).await;

    loop {
        let wait = {
            let s = state.read().await;
            (!s.status.is_polling).then(|| s.time_until_next_poll(Utc::now()))
        };
        let sleep = async {
            match wait {
                Some(wait) => tokio::time::sleep(wait).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = &mut ctrl_c => {
                print_info("Stopping.", ctx.quiet);
                break;
            }
            _ = sleep => {
                start_poll(&state, &provider, &reconciler, &outcome_tx).await;
            }
            Some(()) = force_rx.recv() => {
                if !start_poll(&state, &provider, &reconciler, &outcome_tx).await {
                    print_info("Refresh already in progress", ctx.quiet);
                }
            }
            Some(outcome) = outcome_rx.recv() => {
                render(ctx, &outcome, completed == 0)?;
                last_stale = outcome.display.stale;
                completed += 1;
                if polls.is_some_and(|limit| completed >= limit) {
                    break;
                }
            }
            _ = display_tick.tick() => {
                let display = reconciler.lock().await.display(Utc::now());
                if display.stale != last_stale {
                    last_stale = display.stale;
                    if ctx.format == OutputFormat::Table {
                        println!("{} {}", timestamp(), styled_status(&display));
                    }
                }
            }
        }
    }

    state.write().await.stop();
    Ok(())
}

/// Start a poll unless one is already in flight
async fn start_poll(
    state: &SharedPollingState,
    provider: &Arc<ClaudeUsageProvider>,
    reconciler: &SharedReconciler,
    outcome_tx: &mpsc::Sender<ReconcileOutcome>,
) -> bool {
    if !state.write().await.begin_poll() {
        return false;
    }

    let state = Arc::clone(state);
    let provider = Arc::clone(provider);
    let reconciler = Arc::clone(reconciler);
    let outcome_tx = outcome_tx.clone();

    tokio::spawn(async move {
        let result = provider.fetch_usage().await;
        let outcome = reconciler.lock().await.reconcile(result, Utc::now());

        let error = outcome.display.error.as_ref().map(|e| e.token.to_string());
        state.write().await.complete_poll(error, outcome.next_interval);

        if outcome_tx.send(outcome).await.is_err() {
            log::debug!("[cli:watch] Watch loop ended before poll completed");
        }
    });
    true
}

/// Forward each line typed on stdin as a refresh request
///
/// Uses a plain thread: a blocked stdin read must not hold up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || tx.blocking_send(()).is_err() {
                break;
            }
        }
    });
    rx
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn render(ctx: &Context, outcome: &ReconcileOutcome, first: bool) -> Result<()> {
    let display = &outcome.display;

    if ctx.format == OutputFormat::Json {
        let line = WatchLine {
            at: Utc::now(),
            status: display.status_text(),
            next_poll_secs: outcome.next_interval.as_secs(),
            display,
        };
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    if first {
        for line in display.summary_lines() {
            print_info(&line, ctx.quiet);
        }
    } else {
        print_display_error(display);
    }

    println!(
        "{} {}  (next in {})",
        timestamp(),
        styled_status(display),
        format_interval(outcome.next_interval)
    );
    Ok(())
}
