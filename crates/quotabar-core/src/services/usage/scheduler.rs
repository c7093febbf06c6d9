//! Adaptive ("dynamic refresh") poll scheduling
//!
//! While usage is climbing the poll interval steps down a fixed ladder of
//! faster tiers; after a plateau it steps back up until it reaches the
//! user's base interval again. The ladder only contains tiers strictly
//! faster than the base interval, so polling is never slower than the user
//! asked for and only faster while usage is moving.
//!
//! ```text
//!  tier:      0      1      2      3      N=4
//!  interval:  60s    120s   300s   900s   base
//!             ◄── usage increasing ──   ── plateau ──►
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Full ladder of fast tiers, fastest first (seconds)
pub const REFRESH_LADDER_SECS: [u64; 4] = [60, 120, 300, 900];

/// Unchanged readings needed before stepping one tier slower
pub const UNCHANGED_POLLS_PER_STEP: u32 = 2;

// ============================================================================
// Ladder
// ============================================================================

/// Tiers strictly faster than the base interval, fastest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshLadder {
    tiers: Vec<Duration>,
}

impl RefreshLadder {
    /// Build the effective ladder for a base interval
    pub fn for_base(base: Duration) -> Self {
        let tiers = REFRESH_LADDER_SECS
            .iter()
            .map(|&secs| Duration::from_secs(secs))
            .filter(|tier| *tier < base)
            .collect();
        Self { tiers }
    }

    /// Number of fast tiers; this index also means "at base rate"
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn get(&self, tier: usize) -> Option<Duration> {
        self.tiers.get(tier).copied()
    }

    pub fn tiers(&self) -> &[Duration] {
        &self.tiers
    }
}

// ============================================================================
// Refresh State
// ============================================================================

/// Direction indicator shown next to the status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrend {
    /// Usage is increasing; polling sped up
    Up,
    /// Plateau; polling is slowing back down
    Down,
    /// At the base rate
    #[default]
    Idle,
}

impl RefreshTrend {
    pub fn icon(&self) -> &'static str {
        match self {
            RefreshTrend::Up => "↑",
            RefreshTrend::Down => "↓",
            RefreshTrend::Idle => "·",
        }
    }
}

/// Adaptive polling state, advanced once per successful fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRefreshState {
    /// Index into the ladder; `ladder.len()` means base rate
    pub tier_index: usize,
    /// Primary percentage at the previous fetch
    pub previous_pct: Option<u32>,
    /// Consecutive fetches with an unchanged percentage
    pub unchanged_count: u32,
    pub trend: RefreshTrend,
}

impl DynamicRefreshState {
    /// Initial state: base rate, nothing observed
    pub fn initial(ladder: &RefreshLadder) -> Self {
        Self {
            tier_index: ladder.len(),
            previous_pct: None,
            unchanged_count: 0,
            trend: RefreshTrend::Idle,
        }
    }

    pub fn is_initial(&self, ladder: &RefreshLadder) -> bool {
        *self == Self::initial(ladder)
    }

    /// Advance the state with the latest primary percentage
    ///
    /// A drop in percentage only marks the state idle; moving back to the
    /// base tier after a reset is the cycle detector's job.
    pub fn observe(&mut self, percent: u32, ladder: &RefreshLadder) {
        let base_tier = ladder.len();
        self.tier_index = self.tier_index.min(base_tier);

        let Some(previous) = self.previous_pct else {
            self.previous_pct = Some(percent);
            return;
        };

        if percent > previous {
            self.tier_index = self.tier_index.saturating_sub(1);
            self.unchanged_count = 0;
            self.trend = RefreshTrend::Up;
        } else if percent == previous {
            self.unchanged_count += 1;
            if self.unchanged_count >= UNCHANGED_POLLS_PER_STEP {
                self.tier_index = (self.tier_index + 1).min(base_tier);
                self.unchanged_count = 0;
            }
            self.trend = if self.tier_index == base_tier {
                RefreshTrend::Idle
            } else {
                RefreshTrend::Down
            };
        } else {
            self.unchanged_count = 0;
            self.trend = RefreshTrend::Idle;
        }

        self.previous_pct = Some(percent);
    }

    /// Interval the caller should wait before the next poll
    pub fn effective_interval(
        &self,
        enabled: bool,
        base: Duration,
        ladder: &RefreshLadder,
    ) -> Duration {
        if !enabled || ladder.is_empty() || self.tier_index >= ladder.len() {
            return base;
        }
        ladder.get(self.tier_index).unwrap_or(base)
    }
}

// ============================================================================
// Tests
// ============================================================================
