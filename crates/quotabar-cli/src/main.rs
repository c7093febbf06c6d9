//! quotabar CLI - Claude usage monitor
//!
//! Polls the Claude usage API, tracks the burn rate of the 5-hour window,
//! and notifies when usage crosses configured thresholds.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quotabar")]
#[command(author, version, about = "Claude usage monitor with adaptive polling", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Override state directory (or set QUOTABAR_STATE_DIR env var)
    #[arg(long, env = "QUOTABAR_STATE_DIR", global = true)]
    state_dir: Option<String>,

    /// OAuth token to use instead of the stored Claude Code credentials
    #[arg(long, env = "QUOTABAR_OAUTH_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Usage API base URL
    #[arg(long, env = "QUOTABAR_API_URL", global = true, hide = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch usage once and show it
    Status,

    /// Keep polling and show every update (Enter refreshes, Ctrl-C quits)
    Watch {
        /// Exit after this many completed polls
        #[arg(long)]
        polls: Option<u64>,
    },

    /// Show recorded snapshots of the current cycle and the burn rate
    History,

    /// Manage settings
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },

    /// Delete persisted usage state (settings are kept)
    Reset,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = commands::Context::new(
        cli.format,
        cli.quiet,
        cli.state_dir.as_deref(),
        cli.token,
        cli.api_url,
    );
    log::debug!("[cli] State file: {:?}", ctx.state_path());

    match cli.command {
        Commands::Status => commands::status::execute(&ctx).await,
        Commands::Watch { polls } => commands::watch::execute(&ctx, polls).await,
        Commands::History => commands::history::execute(&ctx).await,
        Commands::Config { action } => commands::config::execute(&ctx, action).await,
        Commands::Reset => commands::reset::execute(&ctx).await,
    }
}
