//! Status command
//!
//! Fetches usage once, reconciles it and prints the result.

use anyhow::Result;
use chrono::Utc;
use quotabar_core::services::usage::{DisplayModel, ReconcileOutcome, UsageProvider};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{
    format_interval, print_display_error, print_info, print_json, print_output, styled_status,
    OutputFormat,
};

/// Category row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct CategoryRow {
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Resets In")]
    pub resets_in: String,
}

impl CategoryRow {
    pub fn from_display(display: &DisplayModel) -> Vec<Self> {
        display
            .categories
            .iter()
            .map(|c| CategoryRow {
                limit: c.category.display_name().to_string(),
                used: format!("{}%", c.percent),
                resets_in: c.resets_in.clone().unwrap_or_else(|| "-".to_string()),
            })
            .collect()
    }
}

/// JSON shape of a status report
#[derive(Debug, Serialize)]
pub struct StatusReport<'a> {
    pub status: String,
    pub next_poll_secs: u64,
    #[serde(flatten)]
    pub display: &'a DisplayModel,
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let mut reconciler = ctx.reconciler()?;
    let provider = ctx.provider();

    let result = provider.fetch_usage().await;
    let outcome = reconciler.reconcile(result, Utc::now());

    print_outcome(ctx, &outcome)
}

/// Print a full status report for one reconciliation
pub fn print_outcome(ctx: &Context, outcome: &ReconcileOutcome) -> Result<()> {
    let display = &outcome.display;

    if ctx.format == OutputFormat::Json {
        return print_json(&StatusReport {
            status: display.status_text(),
            next_poll_secs: outcome.next_interval.as_secs(),
            display,
        });
    }

    println!("{}", styled_status(display));
    let rows = CategoryRow::from_display(display);
    if !rows.is_empty() {
        print_output(&rows, ctx.format)?;
    }

    print_display_error(display);
    for line in display.detail_lines() {
        print_info(&line, ctx.quiet);
    }
    print_info(
        &format!("Next poll in {}", format_interval(outcome.next_interval)),
        ctx.quiet,
    );

    Ok(())
}
