//! History command
//!
//! Shows the snapshots recorded in the current usage cycle.

use anyhow::Result;
use chrono::Local;
use quotabar_core::services::usage::{RateEstimate, SnapshotHistory};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_info, print_json, print_output, OutputFormat};

/// Snapshot row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct SnapshotRow {
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "5h Usage")]
    pub usage: String,
}

#[derive(Debug, Serialize)]
struct HistoryReport<'a> {
    cycle_resets_at: Option<&'a str>,
    snapshots: &'a SnapshotHistory,
    rate: Option<RateEstimate>,
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let reconciler = ctx.reconciler()?;
    let history = reconciler.history();
    let rate = history.estimate_rate();

    if ctx.format == OutputFormat::Json {
        return print_json(&HistoryReport {
            cycle_resets_at: reconciler.cycle_marker(),
            snapshots: history,
            rate,
        });
    }

    let rows: Vec<SnapshotRow> = history
        .entries()
        .iter()
        .map(|s| SnapshotRow {
            time: s
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            usage: format!("{:.1}%", s.pct),
        })
        .collect();
    print_output(&rows, ctx.format)?;

    match rate {
        Some(rate) => print_info(&format!("Rate: {}", rate), ctx.quiet),
        None => print_info("Rate: not enough data yet", ctx.quiet),
    }
    if let Some(marker) = reconciler.cycle_marker() {
        print_info(&format!("Cycle resets at {}", marker), ctx.quiet);
    }

    Ok(())
}
