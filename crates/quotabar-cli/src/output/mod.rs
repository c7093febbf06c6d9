//! Output formatting module
//!
//! Provides table and JSON output formatting for CLI commands, plus the
//! terminal notification sink.

use std::fmt::Display;
use std::time::Duration;

use colored::Colorize;
use quotabar_core::services::usage::{DisplayModel, Notifier};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'table' or 'json'", s)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Print data in the specified format
pub fn print_output<T>(data: &[T], format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
{
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("No items found.");
            } else {
                let table = Table::new(data).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => print_json(data)?,
    }
    Ok(())
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}

/// Print a success message (respects quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message.green());
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{}", message.yellow().bold());
}

/// Print an info message (respects quiet mode)
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

/// Compact status line, colored by error state
pub fn styled_status(display: &DisplayModel) -> String {
    let text = display.status_text();
    match &display.error {
        Some(err) if err.emphasized => text.yellow().bold().to_string(),
        Some(_) => text.red().to_string(),
        None if display.stale => text.dimmed().to_string(),
        None => text,
    }
}

/// Print the fetch error (if any) with its hint
pub fn print_display_error(display: &DisplayModel) {
    let Some(err) = &display.error else { return };
    let message = format!("{} ({})", err.description, err.token);
    if err.emphasized {
        print_warning(&message);
    } else {
        print_error(&message);
    }
    if let Some(hint) = err.hint {
        eprintln!("  {}", hint);
    }
}

/// "45s", "5m", "1h 30m"
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, 0, _) => format!("{}h", h),
        (h, m, _) => format!("{}h {}m", h, m),
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Notifier that prints to stderr
#[derive(Debug, Clone, Copy)]
pub struct TerminalNotifier {
    quiet: bool,
}

impl TerminalNotifier {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("[cli:notify] {} - {}", title, body);
        if !self.quiet {
            eprintln!("{} {}", format!("[{}]", title).yellow().bold(), body);
        }
    }
}
