//! Reset command
//!
//! Deletes persisted usage state: snapshots, cycle marker, fired alerts,
//! adaptive polling state and the cached last fetch.

use anyhow::Result;

use super::Context;
use crate::output::print_success;

pub async fn execute(ctx: &Context) -> Result<()> {
    let mut reconciler = ctx.reconciler()?;
    reconciler.clear_state();
    print_success("Usage state cleared (settings kept)", ctx.quiet);
    Ok(())
}
