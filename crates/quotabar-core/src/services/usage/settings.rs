//! User settings
//!
//! Persisted as one JSON blob under [`KEY_SETTINGS`](super::store::KEY_SETTINGS).

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::alerts::DEFAULT_ALERT_THRESHOLDS;
use super::types::UsageCategory;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Minimum base polling interval in seconds
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Maximum base polling interval in seconds (one day)
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default base polling interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Below this percentage no countdown is shown
pub const DEFAULT_LOW_USAGE_PERCENT: u32 = 30;

/// From this percentage on the countdown includes minutes
pub const DEFAULT_HIGH_USAGE_PERCENT: u32 = 61;

/// Keys accepted by [`UsageSettings::set_value`]
pub const SETTING_KEYS: [&str; 8] = [
    "interval",
    "adaptive",
    "thresholds",
    "threshold_alerts",
    "reset_alerts",
    "refresh_icon",
    "low_usage",
    "high_usage",
];

// ============================================================================
// Settings
// ============================================================================

/// Settings that drive polling, alerts and display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSettings {
    /// Base polling interval in seconds (60 to 86400)
    pub base_interval_secs: u64,
    /// Adaptive ("dynamic refresh") polling
    pub adaptive_polling: bool,
    /// Percentages that trigger a once-per-cycle notification
    pub alert_thresholds: Vec<u32>,
    /// Whether threshold notifications are sent
    pub threshold_alerts: bool,
    /// Categories that notify when they reset to 0%
    pub reset_alert_categories: BTreeSet<UsageCategory>,
    /// Show the adaptive polling trend icon
    pub show_refresh_icon: bool,
    /// Countdown policy lower bound
    pub low_usage_percent: u32,
    /// Countdown policy upper bound
    pub high_usage_percent: u32,
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            base_interval_secs: DEFAULT_INTERVAL_SECS,
            adaptive_polling: false,
            alert_thresholds: DEFAULT_ALERT_THRESHOLDS.to_vec(),
            threshold_alerts: true,
            reset_alert_categories: [UsageCategory::FiveHour, UsageCategory::SevenDay]
                .into_iter()
                .collect(),
            show_refresh_icon: true,
            low_usage_percent: DEFAULT_LOW_USAGE_PERCENT,
            high_usage_percent: DEFAULT_HIGH_USAGE_PERCENT,
        }
    }
}

impl UsageSettings {
    /// Validate and normalize the settings
    pub fn validate(&self) -> Self {
        let low = self.low_usage_percent.min(100);
        let high = self.high_usage_percent.clamp(low, 100);
        Self {
            base_interval_secs: self
                .base_interval_secs
                .clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS),
            adaptive_polling: self.adaptive_polling,
            alert_thresholds: normalize_thresholds(&self.alert_thresholds),
            threshold_alerts: self.threshold_alerts,
            reset_alert_categories: self.reset_alert_categories.clone(),
            show_refresh_icon: self.show_refresh_icon,
            low_usage_percent: low,
            high_usage_percent: high,
        }
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.base_interval_secs)
    }

    /// Apply a `key = value` pair from the command line
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for unknown keys or unparsable values.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key.to_lowercase().as_str() {
            "interval" => self.base_interval_secs = parse_interval(value)?,
            "adaptive" => self.adaptive_polling = parse_bool(value)?,
            "thresholds" => self.alert_thresholds = parse_list(value)?,
            "threshold_alerts" => self.threshold_alerts = parse_bool(value)?,
            "reset_alerts" => {
                self.reset_alert_categories = if value.trim().is_empty() || value == "none" {
                    BTreeSet::new()
                } else {
                    value
                        .split(',')
                        .map(|s| s.parse::<UsageCategory>().map_err(Error::config))
                        .collect::<Result<_>>()?
                }
            }
            "refresh_icon" => self.show_refresh_icon = parse_bool(value)?,
            "low_usage" => self.low_usage_percent = parse_number(value)?,
            "high_usage" => self.high_usage_percent = parse_number(value)?,
            _ => {
                return Err(Error::config(format!(
                    "Unknown setting: {}. Available keys: {}",
                    key,
                    SETTING_KEYS.join(", ")
                )))
            }
        }
        *self = self.validate();
        Ok(())
    }

    /// Current value of a key, formatted the way `set_value` accepts it
    pub fn get_value(&self, key: &str) -> Option<String> {
        let value = match key.to_lowercase().as_str() {
            "interval" => format!("{}s", self.base_interval_secs),
            "adaptive" => self.adaptive_polling.to_string(),
            "thresholds" => join(self.alert_thresholds.iter()),
            "threshold_alerts" => self.threshold_alerts.to_string(),
            "reset_alerts" => join(self.reset_alert_categories.iter()),
            "refresh_icon" => self.show_refresh_icon.to_string(),
            "low_usage" => self.low_usage_percent.to_string(),
            "high_usage" => self.high_usage_percent.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// Keep thresholds in 1..=100, ascending, without duplicates
pub fn normalize_thresholds(thresholds: &[u32]) -> Vec<u32> {
    thresholds
        .iter()
        .copied()
        .filter(|t| (1..=100).contains(t))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn join<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(Error::config(format!("Expected on/off, got: {}", value))),
    }
}

fn parse_number(value: &str) -> Result<u32> {
    value
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|_| Error::config(format!("Expected a number, got: {}", value)))
}

fn parse_list(value: &str) -> Result<Vec<u32>> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    value.split(',').map(parse_number).collect()
}

/// Parse "90", "90s", "15m" or "1h" into seconds
fn parse_interval(value: &str) -> Result<u64> {
    let value = value.trim().to_lowercase();
    let (digits, multiplier) = if let Some(v) = value.strip_suffix('h') {
        (v, 3600)
    } else if let Some(v) = value.strip_suffix('m') {
        (v, 60)
    } else if let Some(v) = value.strip_suffix('s') {
        (v, 1)
    } else {
        (value.as_str(), 1)
    };
    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| Error::config(format!("Invalid interval: {}", value)))
}

// ============================================================================
// Tests
// ============================================================================
