//! Polling status
//!
//! Bookkeeping for the caller's timer loop: whether it runs, whether a poll
//! is in flight, when the last poll finished and when the next one is due.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  begin_poll()   ┌──────────────┐
//! │ timer tick / │ ───────────────►│ PollingState │ false → skip tick
//! │ forced poll  │                 └──────┬───────┘
//! └──────────────┘                        │ true
//!                                         ▼
//!                          provider.fetch_usage() → reconciler
//!                                         │
//!                                         ▼
//!                       complete_poll(error, next_interval)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// ============================================================================
// Polling Status
// ============================================================================

/// Status of the polling loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollingStatus {
    /// Whether the loop is currently running
    pub is_running: bool,
    /// Whether a poll is currently in progress
    pub is_polling: bool,
    /// Last completed poll
    pub last_poll_at: Option<DateTime<Utc>>,
    /// Next scheduled poll
    pub next_poll_at: Option<DateTime<Utc>>,
    /// Error token of the last poll, if it failed
    pub last_error: Option<String>,
    /// Polls completed since start
    pub poll_count: u64,
}

// ============================================================================
// Polling State
// ============================================================================

/// Internal state of the polling loop
#[derive(Debug)]
pub struct PollingState {
    /// Current status
    pub status: PollingStatus,
    /// Interval until the next poll
    interval: Duration,
}

impl PollingState {
    /// Create a stopped polling state
    pub fn new(interval: Duration) -> Self {
        Self {
            status: PollingStatus::default(),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running
    }

    /// Mark as started
    pub fn start(&mut self) {
        self.status.is_running = true;
        self.update_next_poll_time(Utc::now());
    }

    /// Mark as stopped
    pub fn stop(&mut self) {
        self.status.is_running = false;
        self.status.next_poll_at = None;
    }

    /// Mark a poll as starting
    ///
    /// Returns false when another poll is still in flight; the caller must
    /// skip this tick.
    pub fn begin_poll(&mut self) -> bool {
        if self.status.is_polling {
            log::debug!("[usage:timer] Poll already in flight, skipping");
            return false;
        }
        self.status.is_polling = true;
        true
    }

    /// Mark a poll as complete and schedule the next one
    pub fn complete_poll(&mut self, error: Option<String>, next_interval: Duration) {
        let now = Utc::now();
        self.status.is_polling = false;
        self.status.last_poll_at = Some(now);
        self.status.last_error = error;
        self.status.poll_count += 1;
        self.interval = next_interval;
        self.update_next_poll_time(now);
    }

    /// Time left until the next scheduled poll
    pub fn time_until_next_poll(&self, now: DateTime<Utc>) -> Duration {
        self.status
            .next_poll_at
            .and_then(|next| next.signed_duration_since(now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    fn update_next_poll_time(&mut self, now: DateTime<Utc>) {
        if self.status.is_running {
            let next = chrono::Duration::from_std(self.interval)
                .ok()
                .and_then(|interval| now.checked_add_signed(interval));
            if next.is_none() {
                log::warn!("[usage:timer] Interval {:?} out of range, not scheduling", self.interval);
            }
            self.status.next_poll_at = next;
        }
    }
}

/// Shared state wrapper for thread-safe access
pub type SharedPollingState = Arc<RwLock<PollingState>>;

/// Create a new shared polling state
pub fn create_shared_state(interval: Duration) -> SharedPollingState {
    Arc::new(RwLock::new(PollingState::new(interval)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PollingState {
        PollingState::new(Duration::from_secs(300))
    }

    #[test]
    fn test_polling_state_new() {
        let state = state();
        assert!(!state.is_running());
        assert!(!state.status.is_polling);
        assert_eq!(state.interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_polling_state_start_stop() {
        let mut state = state();

        state.start();
        assert!(state.is_running());
        assert!(state.status.next_poll_at.is_some());

        state.stop();
        assert!(!state.is_running());
        assert!(state.status.next_poll_at.is_none());
    }

    #[test]
    fn test_out_of_range_interval_does_not_panic() {
        let mut state = PollingState::new(Duration::from_secs(10_000_000_000_000));
        state.start();
        assert!(state.status.next_poll_at.is_none());

        assert!(state.begin_poll());
        state.complete_poll(None, Duration::from_secs(u64::MAX));
        assert!(!state.status.is_polling);
        assert_eq!(state.status.poll_count, 1);
    }

    #[test]
    fn test_begin_poll_guards_reentry() {
        let mut state = state();
        state.start();

        assert!(state.begin_poll());
        assert!(state.status.is_polling);
        assert!(!state.begin_poll());

        state.complete_poll(None, Duration::from_secs(60));
        assert!(state.begin_poll());
    }

    #[test]
    fn test_complete_poll_updates_schedule() {
        let mut state = state();
        state.start();
        state.begin_poll();

        state.complete_poll(None, Duration::from_secs(120));
        assert!(!state.status.is_polling);
        assert!(state.status.last_poll_at.is_some());
        assert!(state.status.last_error.is_none());
        assert_eq!(state.status.poll_count, 1);
        assert_eq!(state.interval(), Duration::from_secs(120));

        let last = state.status.last_poll_at.unwrap();
        let next = state.status.next_poll_at.unwrap();
        assert_eq!(next.signed_duration_since(last).num_seconds(), 120);
    }

    #[test]
    fn test_complete_poll_with_error() {
        let mut state = state();
        state.start();
        state.begin_poll();

        state.complete_poll(Some("network?".to_string()), Duration::from_secs(300));
        assert_eq!(state.status.last_error.as_deref(), Some("network?"));
    }

    #[test]
    fn test_time_until_next_poll() {
        let mut state = state();
        assert_eq!(state.time_until_next_poll(Utc::now()), Duration::ZERO);

        state.start();
        let remaining = state.time_until_next_poll(Utc::now());
        assert!(remaining > Duration::from_secs(290));
        assert!(remaining <= Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_shared_state_concurrent_access() {
        let shared = create_shared_state(Duration::from_secs(300));

        {
            let mut state = shared.write().await;
            state.start();
            assert!(state.begin_poll());
        }

        let other = Arc::clone(&shared);
        let handle = tokio::spawn(async move { other.write().await.begin_poll() });
        assert!(!handle.await.unwrap());

        let state = shared.read().await;
        assert!(state.is_running());
    }
}
