//! Usage reconciler
//!
//! The single entry point for fetch results. Each success runs the
//! components in a fixed order and returns what to show and when to poll
//! next; a failure only changes the error shown.
//!
//! ```text
//!  fetch result ──► cycle detector ──► history ──► alerts ──► scheduler
//!                        │ new cycle: clear history, fired thresholds,
//!                        │            refresh state
//!                        ▼
//!                  persist ──► ReconcileOutcome { display, next_interval }
//! ```

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::alerts::{AlertState, Notifier, UsageAlert};
use super::cycle::detect_transition;
use super::display::{format_countdown, is_stale, CategoryDisplay, CountdownStyle, DisplayModel, ErrorDisplay};
use super::history::SnapshotHistory;
use super::provider::UsageError;
use super::scheduler::{DynamicRefreshState, RefreshLadder};
use super::settings::{normalize_thresholds, UsageSettings};
use super::store::{
    load_json, save_json, KeyValueStore, KEY_ALERTS, KEY_CYCLE_MARKER, KEY_DYNAMIC_REFRESH,
    KEY_HISTORY, KEY_LAST_FETCH, KEY_SETTINGS, STATE_KEYS,
};
use super::types::{UsageCategory, UsagePayload};

// ============================================================================
// Types
// ============================================================================

/// The last successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastFetch {
    pub payload: UsagePayload,
    pub fetched_at: DateTime<Utc>,
}

/// Result of one reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub display: DisplayModel,
    /// How long the caller should wait before the next poll
    pub next_interval: Duration,
    /// Notifications sent during this reconciliation
    pub alerts: Vec<UsageAlert>,
}

// ============================================================================
// UsageReconciler
// ============================================================================

/// Owns all usage state and applies fetch results to it
pub struct UsageReconciler {
    settings: UsageSettings,
    store: Box<dyn KeyValueStore>,
    notifier: Box<dyn Notifier>,
    ladder: RefreshLadder,
    history: SnapshotHistory,
    cycle_marker: Option<String>,
    alerts: AlertState,
    refresh: DynamicRefreshState,
    last_fetch: Option<LastFetch>,
    last_error: Option<UsageError>,
}

impl UsageReconciler {
    /// Create a reconciler with explicit settings
    ///
    /// Usage state is restored from `store`; the settings are not persisted
    /// until one of the mutators runs.
    pub fn new(
        settings: UsageSettings,
        store: impl KeyValueStore + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        let settings = settings.validate();
        let ladder = RefreshLadder::for_base(settings.base_interval());

        let mut refresh = load_json::<Option<DynamicRefreshState>>(&store, KEY_DYNAMIC_REFRESH)
            .unwrap_or_else(|| DynamicRefreshState::initial(&ladder));
        refresh.tier_index = refresh.tier_index.min(ladder.len());

        let reconciler = Self {
            history: load_json(&store, KEY_HISTORY),
            cycle_marker: load_json(&store, KEY_CYCLE_MARKER),
            alerts: load_json(&store, KEY_ALERTS),
            last_fetch: load_json(&store, KEY_LAST_FETCH),
            refresh,
            ladder,
            settings,
            store: Box::new(store),
            notifier: Box::new(notifier),
            last_error: None,
        };

        log::debug!(
            "[usage:reconciler] Restored {} snapshots, marker {:?}, tier {}/{}",
            reconciler.history.len(),
            reconciler.cycle_marker,
            reconciler.refresh.tier_index,
            reconciler.ladder.len()
        );
        reconciler
    }

    /// Create a reconciler with the settings persisted in `store`
    pub fn load(store: impl KeyValueStore + 'static, notifier: impl Notifier + 'static) -> Self {
        let settings: UsageSettings = load_json(&store, KEY_SETTINGS);
        Self::new(settings, store, notifier)
    }

    // ------------------------------------------------------------------------
    // Fetch results
    // ------------------------------------------------------------------------

    /// Apply a fetch result
    pub fn reconcile(
        &mut self,
        result: Result<UsagePayload, UsageError>,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        match result {
            Ok(payload) => self.on_fetch_succeeded(payload, now),
            Err(error) => self.on_fetch_failed(error, now),
        }
    }

    /// Apply a successful fetch
    pub fn on_fetch_succeeded(&mut self, payload: UsagePayload, now: DateTime<Utc>) -> ReconcileOutcome {
        let primary = payload.primary().cloned();
        let mut fired = Vec::new();

        let transition = detect_transition(
            self.cycle_marker.as_deref(),
            primary.as_ref().and_then(|p| p.resets_at.as_deref()),
        );
        if transition.is_new_cycle {
            log::info!(
                "[usage:reconciler] New usage cycle ({:?} -> {:?}), clearing state",
                self.cycle_marker,
                transition.marker
            );
            self.history.clear();
            self.alerts.clear_fired();
            self.refresh = DynamicRefreshState::initial(&self.ladder);
        }
        self.cycle_marker = transition.marker;

        if let Some(point) = primary.as_ref() {
            let percent = point.percent();

            // The opening reading of a cycle is not a history point or a
            // scheduler step, but it can cross a threshold.
            if !transition.is_new_cycle {
                self.history = std::mem::take(&mut self.history).record(point.utilization, now);
            }

            if self.settings.threshold_alerts {
                for threshold in self
                    .alerts
                    .check_thresholds(&self.settings.alert_thresholds, percent)
                {
                    fired.push(UsageAlert::ThresholdCrossed {
                        category: UsageCategory::PRIMARY,
                        threshold,
                        percent,
                    });
                }
            }

            if self.settings.adaptive_polling && !transition.is_new_cycle {
                self.refresh.observe(percent, &self.ladder);
            }
        }

        for (category, point) in &payload.points {
            let was_reset = self.alerts.check_reset(*category, point.percent());
            if was_reset && self.settings.reset_alert_categories.contains(category) {
                fired.push(UsageAlert::CategoryReset {
                    category: *category,
                });
            }
        }

        for alert in &fired {
            self.notifier.notify(&alert.title(), &alert.body());
        }

        self.last_fetch = Some(LastFetch {
            payload,
            fetched_at: now,
        });
        self.last_error = None;
        self.persist_state();

        let outcome = ReconcileOutcome {
            display: self.display(now),
            next_interval: self.next_interval(),
            alerts: fired,
        };
        log::debug!(
            "[usage:reconciler] Reconciled: {} (next poll in {}s)",
            outcome.display.status_text(),
            outcome.next_interval.as_secs()
        );
        outcome
    }

    /// Apply a failed fetch
    ///
    /// Only the error shown changes; cached data, history and the poll
    /// schedule stay as they were.
    pub fn on_fetch_failed(&mut self, error: UsageError, now: DateTime<Utc>) -> ReconcileOutcome {
        log::warn!("[usage:reconciler] Fetch failed: {}", error);
        self.last_error = Some(error);
        ReconcileOutcome {
            display: self.display(now),
            next_interval: self.next_interval(),
            alerts: Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Settings mutators
    // ------------------------------------------------------------------------

    /// Turn adaptive polling on or off; returns the new poll interval
    pub fn set_adaptive_polling_enabled(&mut self, enabled: bool) -> Duration {
        let settings = UsageSettings {
            adaptive_polling: enabled,
            ..self.settings.clone()
        };
        self.refresh = DynamicRefreshState::initial(&self.ladder);
        self.apply_settings(settings);
        self.next_interval()
    }

    /// Change the base poll interval; returns the new poll interval
    pub fn set_base_poll_interval(&mut self, interval: Duration) -> Duration {
        let settings = UsageSettings {
            base_interval_secs: interval.as_secs(),
            ..self.settings.clone()
        };
        self.apply_settings(settings);
        self.next_interval()
    }

    /// Replace the alert thresholds
    pub fn set_alert_thresholds(&mut self, thresholds: &[u32]) {
        let settings = UsageSettings {
            alert_thresholds: normalize_thresholds(thresholds),
            ..self.settings.clone()
        };
        self.apply_settings(settings);
    }

    /// Replace all settings, re-deriving whatever depends on them
    pub fn apply_settings(&mut self, settings: UsageSettings) {
        let settings = settings.validate();

        if settings.base_interval_secs != self.settings.base_interval_secs {
            self.ladder = RefreshLadder::for_base(settings.base_interval());
            self.refresh = DynamicRefreshState::initial(&self.ladder);
        } else if settings.adaptive_polling != self.settings.adaptive_polling {
            self.refresh = DynamicRefreshState::initial(&self.ladder);
        }

        self.alerts.retain_thresholds(&settings.alert_thresholds);
        self.settings = settings;

        log::info!(
            "[usage:reconciler] Settings updated: base {}s, adaptive {}, thresholds {:?}",
            self.settings.base_interval_secs,
            self.settings.adaptive_polling,
            self.settings.alert_thresholds
        );
        save_json(&mut *self.store, KEY_SETTINGS, &self.settings);
        save_json(&mut *self.store, KEY_ALERTS, &self.alerts);
        save_json(&mut *self.store, KEY_DYNAMIC_REFRESH, &self.refresh);
    }

    /// Forget all usage state (settings are kept)
    pub fn clear_state(&mut self) {
        self.history.clear();
        self.cycle_marker = None;
        self.alerts = AlertState::new();
        self.refresh = DynamicRefreshState::initial(&self.ladder);
        self.last_fetch = None;
        self.last_error = None;

        for key in STATE_KEYS {
            if let Err(e) = self.store.delete(key) {
                log::warn!("[usage:reconciler] Failed to delete {}: {}", key, e);
            }
        }
        log::info!("[usage:reconciler] Usage state cleared");
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Interval until the next poll under the current state
    pub fn next_interval(&self) -> Duration {
        self.refresh.effective_interval(
            self.settings.adaptive_polling,
            self.settings.base_interval(),
            &self.ladder,
        )
    }

    /// Build the display model, rendering dates in local time
    pub fn display(&self, now: DateTime<Utc>) -> DisplayModel {
        self.display_in(now, &Local)
    }

    /// Build the display model, rendering dates in `tz`
    pub fn display_in<Tz>(&self, now: DateTime<Utc>, tz: &Tz) -> DisplayModel
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut model = DisplayModel::default();

        if let Some(last) = &self.last_fetch {
            for (category, point) in &last.payload.points {
                let percent = point.percent();
                let resets_at = point.resets_at_time();
                let style = CountdownStyle::for_percent(
                    percent,
                    self.settings.low_usage_percent,
                    self.settings.high_usage_percent,
                );
                let countdown = match style {
                    CountdownStyle::Hidden => None,
                    style => resets_at.map(|at| format_countdown(at, now, style, tz)),
                };

                model.categories.push(CategoryDisplay {
                    category: *category,
                    label: category.label(),
                    percent,
                    countdown,
                    resets_in: resets_at.map(|at| format_countdown(at, now, CountdownStyle::Full, tz)),
                });
            }
            model.extra_credits = last.payload.extra_credits.clone();
            model.last_success_at = Some(last.fetched_at);
        }

        model.rate = self.history.estimate_rate().map(|rate| rate.to_string());
        if self.settings.adaptive_polling && self.settings.show_refresh_icon {
            model.refresh_trend = Some(self.refresh.trend);
        }
        model.error = self.last_error.as_ref().map(ErrorDisplay::from);
        model.stale = is_stale(model.last_success_at, now, self.settings.base_interval());
        model
    }

    pub fn settings(&self) -> &UsageSettings {
        &self.settings
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn cycle_marker(&self) -> Option<&str> {
        self.cycle_marker.as_deref()
    }

    pub fn alert_state(&self) -> &AlertState {
        &self.alerts
    }

    pub fn refresh_state(&self) -> &DynamicRefreshState {
        &self.refresh
    }

    pub fn ladder(&self) -> &RefreshLadder {
        &self.ladder
    }

    pub fn last_fetch(&self) -> Option<&LastFetch> {
        self.last_fetch.as_ref()
    }

    pub fn last_error(&self) -> Option<&UsageError> {
        self.last_error.as_ref()
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        &*self.store
    }

    fn persist_state(&mut self) {
        save_json(&mut *self.store, KEY_HISTORY, &self.history);
        save_json(&mut *self.store, KEY_CYCLE_MARKER, &self.cycle_marker);
        save_json(&mut *self.store, KEY_ALERTS, &self.alerts);
        save_json(&mut *self.store, KEY_DYNAMIC_REFRESH, &self.refresh);
        save_json(&mut *self.store, KEY_LAST_FETCH, &self.last_fetch);
    }
}

// ============================================================================
// Tests
// ============================================================================
