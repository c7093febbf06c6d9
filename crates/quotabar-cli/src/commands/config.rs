//! Config commands
//!
//! Commands for viewing and changing persisted settings.

use anyhow::{bail, Result};
use clap::Subcommand;
use quotabar_core::services::usage::{UsageSettings, SETTING_KEYS};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{format_interval, print_error, print_info, print_json, print_output, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
}

/// Config row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Default")]
    pub default: String,
}

pub async fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx),
        ConfigAction::Set { key, value } => set_config(ctx, &key, &value),
        ConfigAction::Get { key } => get_config(ctx, &key),
    }
}

fn config_rows(settings: &UsageSettings) -> Vec<ConfigRow> {
    let defaults = UsageSettings::default();
    SETTING_KEYS
        .iter()
        .map(|key| ConfigRow {
            key: key.to_string(),
            value: settings.get_value(key).unwrap_or_default(),
            default: defaults.get_value(key).unwrap_or_default(),
        })
        .collect()
}

fn show_config(ctx: &Context) -> Result<()> {
    let reconciler = ctx.reconciler()?;

    if ctx.format == OutputFormat::Json {
        return print_json(reconciler.settings());
    }

    print_output(&config_rows(reconciler.settings()), ctx.format)?;
    print_info(&format!("State file: {}", ctx.state_path().display()), ctx.quiet);
    Ok(())
}

fn get_config(ctx: &Context, key: &str) -> Result<()> {
    let reconciler = ctx.reconciler()?;

    match reconciler.settings().get_value(key) {
        Some(value) => println!("{}", value),
        None => {
            print_error(&format!("Unknown config key: {}", key));
            print_info(&format!("Available keys: {}", SETTING_KEYS.join(", ")), ctx.quiet);
            bail!("Unknown config key: {}", key);
        }
    }
    Ok(())
}

fn set_config(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let mut reconciler = ctx.reconciler()?;

    let mut settings = reconciler.settings().clone();
    settings.set_value(key, value)?;
    reconciler.apply_settings(settings);

    let stored = reconciler.settings().get_value(key).unwrap_or_default();
    print_success(&format!("Set {} = {}", key.to_lowercase(), stored), ctx.quiet);
    if key.eq_ignore_ascii_case("interval") || key.eq_ignore_ascii_case("adaptive") {
        print_info(
            &format!("Next poll interval: {}", format_interval(reconciler.next_interval())),
            ctx.quiet,
        );
    }
    Ok(())
}
