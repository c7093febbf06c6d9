//! Threshold and reset notifications
//!
//! Two independent strategies:
//!
//! - **Boundary crossing**: fires once per configured threshold per usage
//!   cycle when the primary percentage reaches it.
//! - **Reset to zero**: fires when a tracked category drops from a positive
//!   percentage to exactly zero.
//!
//! Delivery goes through [`Notifier`], which is fire-and-forget.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::types::UsageCategory;

// ============================================================================
// Constants
// ============================================================================

/// Default alert thresholds (percentages)
pub const DEFAULT_ALERT_THRESHOLDS: [u32; 2] = [80, 90];

// ============================================================================
// Alerts
// ============================================================================

/// A notification the reconciler decided to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageAlert {
    /// The primary category reached a configured threshold
    ThresholdCrossed {
        category: UsageCategory,
        threshold: u32,
        percent: u32,
    },
    /// A category dropped back to zero
    CategoryReset { category: UsageCategory },
}

impl UsageAlert {
    pub fn title(&self) -> String {
        match self {
            UsageAlert::ThresholdCrossed { threshold, .. } => {
                format!("Usage above {}%", threshold)
            }
            UsageAlert::CategoryReset { category } => {
                format!("{} reset", category.display_name())
            }
        }
    }

    pub fn body(&self) -> String {
        match self {
            UsageAlert::ThresholdCrossed {
                category, percent, ..
            } => format!("{} is at {}%.", category.display_name(), percent),
            UsageAlert::CategoryReset { category } => {
                format!("{} is back to 0%.", category.display_name())
            }
        }
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Notification sink
///
/// Implementations must not block and must swallow their own failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn notify(&self, title: &str, body: &str) {
        self(title, body)
    }
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("[usage:alerts] {} - {}", title, body);
    }
}

// ============================================================================
// Alert State
// ============================================================================

/// State for deduplicating alerts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    /// Thresholds already notified in the current cycle
    #[serde(default)]
    fired_thresholds: BTreeSet<u32>,
    /// Last whole percentage seen per category
    #[serde(default)]
    previous_pct: BTreeMap<UsageCategory, u32>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired_thresholds(&self) -> &BTreeSet<u32> {
        &self.fired_thresholds
    }

    pub fn previous_pct(&self, category: UsageCategory) -> Option<u32> {
        self.previous_pct.get(&category).copied()
    }

    /// Return the thresholds newly reached by `percent`
    ///
    /// Each returned threshold is marked fired immediately, so it cannot be
    /// returned again until [`clear_fired`](Self::clear_fired).
    pub fn check_thresholds(&mut self, thresholds: &[u32], percent: u32) -> Vec<u32> {
        let mut crossed = Vec::new();
        for &threshold in thresholds {
            if percent >= threshold && self.fired_thresholds.insert(threshold) {
                crossed.push(threshold);
            }
        }
        crossed
    }

    /// Record the latest percentage for a category
    ///
    /// Returns true when it dropped from above zero to exactly zero.
    pub fn check_reset(&mut self, category: UsageCategory, percent: u32) -> bool {
        let previous = self.previous_pct.insert(category, percent);
        matches!(previous, Some(p) if p > 0) && percent == 0
    }

    /// Forget which thresholds fired (new usage cycle)
    pub fn clear_fired(&mut self) {
        self.fired_thresholds.clear();
    }

    /// Forget fired thresholds that are no longer configured
    pub fn retain_thresholds(&mut self, thresholds: &[u32]) {
        self.fired_thresholds.retain(|t| thresholds.contains(t));
    }
}

// ============================================================================
// Tests
// ============================================================================
