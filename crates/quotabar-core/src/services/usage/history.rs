//! Usage snapshot history and rate-of-change estimation
//!
//! Keeps a short, time-pruned trail of the primary category's utilization so
//! the burn rate can be estimated across process restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Snapshots older than this are pruned (6 hours)
pub const HISTORY_RETENTION_SECS: i64 = 6 * 60 * 60;

/// Hard cap on retained snapshots
pub const HISTORY_MAX_ENTRIES: usize = 100;

/// Minimum span between oldest and newest snapshot before estimating a rate
pub const MIN_RATE_SPAN_SECS: i64 = 300;

/// Projections at or beyond this horizon are not reported
pub const MAX_PROJECTION_HOURS: f64 = 100.0;

// ============================================================================
// Snapshot Types
// ============================================================================

/// Utilization of the primary category at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub timestamp: DateTime<Utc>,
    pub pct: f64,
}

/// Insertion-ordered snapshots, oldest first
///
/// Timestamps are non-decreasing; pruning only ever removes from the front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotHistory {
    entries: Vec<UsageSnapshot>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[UsageSnapshot] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append a reading and prune
    ///
    /// Age pruning runs first, then the count cap. Entries stamped after
    /// `now` (the wall clock moved backwards) are dropped before appending.
    pub fn record(mut self, pct: f64, now: DateTime<Utc>) -> Self {
        self.entries.retain(|s| s.timestamp <= now);
        self.entries.push(UsageSnapshot {
            timestamp: now,
            pct,
        });

        let cutoff = now - chrono::Duration::seconds(HISTORY_RETENTION_SECS);
        let expired = self
            .entries
            .iter()
            .take_while(|s| s.timestamp < cutoff)
            .count();
        self.entries.drain(..expired);

        if self.entries.len() > HISTORY_MAX_ENTRIES {
            let overflow = self.entries.len() - HISTORY_MAX_ENTRIES;
            self.entries.drain(..overflow);
        }

        self
    }

    /// Estimate the burn rate between the oldest and newest snapshot
    ///
    /// Returns `None` with fewer than two snapshots or when they span less
    /// than [`MIN_RATE_SPAN_SECS`].
    pub fn estimate_rate(&self) -> Option<RateEstimate> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.first()?;
        let last = self.entries.last()?;

        let span_secs = last
            .timestamp
            .signed_duration_since(first.timestamp)
            .num_seconds();
        if span_secs < MIN_RATE_SPAN_SECS {
            return None;
        }

        let per_hour_pct = (last.pct - first.pct) / (span_secs as f64 / 3600.0);
        if per_hour_pct <= 0.0 {
            return Some(RateEstimate {
                per_hour_pct,
                hours_to_limit: None,
            });
        }

        let remaining = 100.0 - last.pct;
        let hours_to_limit = if remaining <= 0.0 {
            None
        } else {
            let hours = remaining / per_hour_pct;
            (hours < MAX_PROJECTION_HOURS).then(|| hours.floor() as u32)
        };

        Some(RateEstimate {
            per_hour_pct,
            hours_to_limit,
        })
    }
}

// ============================================================================
// Rate Estimate
// ============================================================================

/// Burn rate of the primary category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    /// Percentage points per hour; zero or negative means stable
    pub per_hour_pct: f64,
    /// Whole hours until 100%, when a meaningful projection exists
    pub hours_to_limit: Option<u32>,
}

impl RateEstimate {
    pub fn is_stable(&self) -> bool {
        self.per_hour_pct <= 0.0
    }
}

impl std::fmt::Display for RateEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_stable() {
            return write!(f, "stable");
        }
        match self.hours_to_limit {
            Some(hours) => write!(f, "~{:.0}%/hr — limit in ~{}h", self.per_hour_pct, hours),
            None => write!(f, "~{:.0}%/hr", self.per_hour_pct),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn history(points: &[(i64, f64)]) -> SnapshotHistory {
        points
            .iter()
            .fold(SnapshotHistory::new(), |h, &(secs, pct)| h.record(pct, t(secs)))
    }

    #[test]
    fn test_record_appends_in_order() {
        let h = history(&[(0, 1.0), (60, 2.0), (120, 3.0)]);
        assert_eq!(h.len(), 3);
        assert_eq!(h.entries()[0].pct, 1.0);
        assert_eq!(h.entries()[2].timestamp, t(120));
    }

    #[test]
    fn test_record_prunes_by_age() {
        let h = history(&[(0, 1.0), (3600, 2.0)]);
        let h = h.record(3.0, t(HISTORY_RETENTION_SECS + 1));
        assert_eq!(h.len(), 2);
        assert_eq!(h.entries()[0].timestamp, t(3600));
    }

    #[test]
    fn test_record_keeps_entry_exactly_at_cutoff() {
        let h = history(&[(0, 1.0)]).record(2.0, t(HISTORY_RETENTION_SECS));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_record_caps_count() {
        let mut h = SnapshotHistory::new();
        for i in 0..250 {
            h = h.record(i as f64 % 100.0, t(i * 10));
        }
        assert_eq!(h.len(), HISTORY_MAX_ENTRIES);
        assert_eq!(h.entries()[0].timestamp, t(150 * 10));
        assert_eq!(h.entries().last().unwrap().timestamp, t(249 * 10));
    }

    #[test]
    fn test_pruning_invariant_holds_for_irregular_sequences() {
        let mut h = SnapshotHistory::new();
        let mut now = 0;
        for step in [5, 7200, 30, 1, 9000, 600, 45, 22000, 3, 3] {
            for _ in 0..40 {
                now += step;
                h = h.record(10.0, t(now));
                assert!(h.len() <= HISTORY_MAX_ENTRIES);
                let cutoff = t(now) - chrono::Duration::seconds(HISTORY_RETENTION_SECS);
                assert!(h.entries().iter().all(|s| s.timestamp >= cutoff));
                assert!(h
                    .entries()
                    .windows(2)
                    .all(|w| w[0].timestamp <= w[1].timestamp));
            }
        }
    }

    #[test]
    fn test_record_drops_future_entries_on_clock_skew() {
        let h = history(&[(0, 1.0), (600, 2.0)]).record(3.0, t(300));
        assert_eq!(h.len(), 2);
        assert_eq!(h.entries()[1].timestamp, t(300));
        assert_eq!(h.entries()[1].pct, 3.0);
    }

    #[test]
    fn test_rate_needs_two_entries() {
        assert!(SnapshotHistory::new().estimate_rate().is_none());
        assert!(history(&[(0, 5.0)]).estimate_rate().is_none());
    }

    #[test]
    fn test_rate_needs_minimum_span() {
        let h = history(&[(0, 5.0), (299, 50.0)]);
        assert!(h.estimate_rate().is_none());

        let h = history(&[(0, 5.0), (300, 50.0)]);
        assert!(h.estimate_rate().is_some());
    }

    #[test]
    fn test_rate_projection() {
        // 5% -> 35% over ten minutes
        let estimate = history(&[(0, 5.0), (600, 35.0)]).estimate_rate().unwrap();
        assert!((estimate.per_hour_pct - 180.0).abs() < 1e-9);
        assert_eq!(estimate.hours_to_limit, Some(0));
        assert_eq!(estimate.to_string(), "~180%/hr — limit in ~0h");
    }

    #[test]
    fn test_rate_projection_floors_hours() {
        // 10%/hr with 45% left -> 4.5h -> 4
        let estimate = history(&[(0, 45.0), (3600, 55.0)]).estimate_rate().unwrap();
        assert_eq!(estimate.hours_to_limit, Some(4));
    }

    #[test]
    fn test_rate_stable_when_flat_or_falling() {
        let flat = history(&[(0, 20.0), (900, 20.0)]).estimate_rate().unwrap();
        assert!(flat.is_stable());
        assert_eq!(flat.hours_to_limit, None);
        assert_eq!(flat.to_string(), "stable");

        let falling = history(&[(0, 20.0), (900, 10.0)]).estimate_rate().unwrap();
        assert!(falling.is_stable());
    }

    #[test]
    fn test_rate_without_projection_at_limit() {
        let estimate = history(&[(0, 90.0), (600, 100.0)]).estimate_rate().unwrap();
        assert_eq!(estimate.hours_to_limit, None);
        assert_eq!(estimate.to_string(), "~60%/hr");
    }

    #[test]
    fn test_rate_without_projection_beyond_horizon() {
        // 0.5%/hr with 90% left -> 180h
        let estimate = history(&[(0, 9.0), (7200, 10.0)]).estimate_rate().unwrap();
        assert_eq!(estimate.hours_to_limit, None);
        assert!(!estimate.is_stable());
    }

    #[test]
    fn test_history_serializes_as_plain_list() {
        let h = history(&[(0, 5.0)]);
        let json = serde_json::to_value(&h).unwrap();
        assert!(json.is_array());
        let back: SnapshotHistory = serde_json::from_value(json).unwrap();
        assert_eq!(back, h);
    }
}
