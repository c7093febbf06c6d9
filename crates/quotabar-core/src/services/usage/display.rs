//! Display model
//!
//! Everything a front end needs to draw the compact status text and the
//! expanded summary, already formatted.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::provider::UsageError;
use super::scheduler::RefreshTrend;
use super::types::{ExtraCredits, UsageCategory};

// ============================================================================
// Countdown Formatting
// ============================================================================

/// How much of the reset countdown to show next to a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownStyle {
    /// Percentage only
    Hidden,
    /// Whole hours
    HoursOnly,
    /// Hours and minutes
    Full,
}

impl CountdownStyle {
    /// Pick the style for a usage level
    ///
    /// Below `low` the countdown is noise; from `high` on every minute counts.
    pub fn for_percent(percent: u32, low: u32, high: u32) -> Self {
        if percent < low {
            CountdownStyle::Hidden
        } else if percent < high {
            CountdownStyle::HoursOnly
        } else {
            CountdownStyle::Full
        }
    }
}

/// Render the time left until `resets_at`
///
/// Past instants render as "due now", anything a day or more away as a
/// calendar date in `tz`.
pub fn format_countdown<Tz>(
    resets_at: DateTime<Utc>,
    now: DateTime<Utc>,
    style: CountdownStyle,
    tz: &Tz,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let remaining = resets_at.signed_duration_since(now).num_seconds();
    if remaining <= 0 {
        return "due now".to_string();
    }
    if remaining >= 24 * 3600 {
        return resets_at.with_timezone(tz).format("%b %-d").to_string();
    }

    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    match (style, hours) {
        (_, 0) => format!("{}m", minutes),
        (CountdownStyle::HoursOnly, h) => format!("{}h", h),
        (_, h) => format!("{}h {}m", h, minutes),
    }
}

/// Whether a display last refreshed at `last_success` is stale
///
/// Stale means no successful fetch for more than twice the base interval.
pub fn is_stale(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>, base: Duration) -> bool {
    let Some(last) = last_success else {
        return false;
    };
    let limit = chrono::Duration::seconds(base.as_secs().saturating_mul(2) as i64);
    now.signed_duration_since(last) > limit
}

// ============================================================================
// Display Model
// ============================================================================

/// One category row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDisplay {
    pub category: UsageCategory,
    pub label: &'static str,
    pub percent: u32,
    /// Countdown text per the countdown policy; `None` when hidden or unknown
    pub countdown: Option<String>,
    /// Countdown text with full precision, for the expanded view
    pub resets_in: Option<String>,
}

impl CategoryDisplay {
    /// "42%" or "42% 3h 10m"
    pub fn compact(&self) -> String {
        match &self.countdown {
            Some(countdown) => format!("{}% {}", self.percent, countdown),
            None => format!("{}%", self.percent),
        }
    }
}

/// Current fetch error, ready to render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDisplay {
    pub token: &'static str,
    pub description: String,
    pub hint: Option<&'static str>,
    /// Render with the alternate (warning) color
    pub emphasized: bool,
}

impl From<&UsageError> for ErrorDisplay {
    fn from(err: &UsageError) -> Self {
        Self {
            token: err.token(),
            description: err.description(),
            hint: err.hint(),
            emphasized: err.is_rate_limited(),
        }
    }
}

/// Snapshot of everything the front end shows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayModel {
    pub categories: Vec<CategoryDisplay>,
    /// Burn-rate text for the primary category
    pub rate: Option<String>,
    /// Adaptive polling indicator, when enabled and visible
    pub refresh_trend: Option<RefreshTrend>,
    pub error: Option<ErrorDisplay>,
    pub extra_credits: Option<ExtraCredits>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl DisplayModel {
    pub fn category(&self, category: UsageCategory) -> Option<&CategoryDisplay> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Compact status text, e.g. "↑ 42% 3h" or "42% · rate limit?"
    pub fn status_text(&self) -> String {
        let mut parts = Vec::new();

        if let Some(trend) = self.refresh_trend {
            parts.push(trend.icon().to_string());
        }

        let primary = self
            .category(UsageCategory::PRIMARY)
            .or_else(|| self.categories.first());
        if let Some(primary) = primary {
            parts.push(primary.compact());
        }

        match &self.error {
            Some(err) if primary.is_some() => parts.push(format!("· {}", err.token)),
            Some(err) => parts.push(err.token.to_string()),
            None if primary.is_none() => parts.push("—".to_string()),
            None => {}
        }

        if self.stale && self.error.is_none() {
            parts.push("(stale)".to_string());
        }

        parts.join(" ")
    }

    /// Lines for the expanded summary
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for category in &self.categories {
            let mut line = format!("{}: {}%", category.category.display_name(), category.percent);
            if let Some(resets_in) = &category.resets_in {
                line.push_str(&format!(" (resets {})", resets_in));
            }
            lines.push(line);
        }

        if let Some(err) = &self.error {
            lines.push(format!("Error: {}", err.description));
            if let Some(hint) = err.hint {
                lines.push(hint.to_string());
            }
        }

        lines.extend(self.detail_lines());
        lines
    }

    /// Extra credits, rate and last update
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(extra) = &self.extra_credits {
            lines.push(format!("Extra credits: ${:.2} / ${:.2}", extra.used, extra.limit));
        }

        if let Some(rate) = &self.rate {
            lines.push(format!("Rate: {}", rate));
        }

        match self.last_success_at {
            Some(at) if self.stale => lines.push(format!("Last updated {} (stale)", at.to_rfc3339())),
            Some(at) => lines.push(format!("Last updated {}", at.to_rfc3339())),
            None => lines.push("Never updated".to_string()),
        }

        lines
    }
}

// ============================================================================
// Tests
// ============================================================================
