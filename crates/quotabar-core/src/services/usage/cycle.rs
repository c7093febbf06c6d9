//! Reset-cycle detection
//!
//! The provider reports when the primary window resets. A different reset
//! instant means a new usage cycle has started.

/// Outcome of comparing a fresh reset timestamp against the stored marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTransition {
    /// True when a new usage cycle started
    pub is_new_cycle: bool,
    /// Marker to store for the next comparison
    pub marker: Option<String>,
}

/// Compare the stored cycle marker with the latest reported reset time
///
/// Comparison is by raw string identity. A missing reset time never clears
/// the marker, otherwise the next fetch carrying the old value would look
/// like a transition.
pub fn detect_transition(stored: Option<&str>, resets_at: Option<&str>) -> CycleTransition {
    match resets_at {
        Some(new) => CycleTransition {
            is_new_cycle: stored != Some(new),
            marker: Some(new.to_string()),
        },
        None => CycleTransition {
            is_new_cycle: false,
            marker: stored.map(str::to_string),
        },
    }
}
