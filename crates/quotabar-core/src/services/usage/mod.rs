//! Usage tracking module
//!
//! Turns raw usage fetches into what a menu-bar style front end shows, and
//! decides when to poll next.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ caller (timer loop)                                     │
//! │   PollingState::begin_poll() → provider.fetch_usage()   │
//! └─────────────────────────────────────────────────────────┘
//!          │ Result<UsagePayload, UsageError>
//!          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │ UsageReconciler                                         │
//! │   cycle detector → snapshot history → alerts → scheduler│
//! └─────────────────────────────────────────────────────────┘
//!          │                      │                   │
//!          ▼                      ▼                   ▼
//!   ┌─────────────┐        ┌────────────┐      ┌────────────┐
//!   │KeyValueStore│        │  Notifier  │      │DisplayModel│
//!   │(file/memory)│        │(log/term.) │      │+ interval  │
//!   └─────────────┘        └────────────┘      └────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use quotabar_core::services::usage::{
//!     ClaudeUsageProvider, JsonFileStore, LogNotifier, UsageProvider, UsageReconciler,
//! };
//!
//! let store = JsonFileStore::open(JsonFileStore::default_path())?;
//! let mut reconciler = UsageReconciler::load(store, LogNotifier);
//! let provider = ClaudeUsageProvider::new();
//!
//! let outcome = reconciler.reconcile(provider.fetch_usage().await, chrono::Utc::now());
//! println!("{}", outcome.display.status_text());
//! tokio::time::sleep(outcome.next_interval).await;
//! ```

pub mod alerts;
pub mod claude;
pub mod cycle;
pub mod display;
pub mod history;
pub mod provider;
pub mod reconciler;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod timer;
pub mod types;

pub use alerts::{AlertState, LogNotifier, Notifier, UsageAlert, DEFAULT_ALERT_THRESHOLDS};
pub use claude::ClaudeUsageProvider;
pub use cycle::{detect_transition, CycleTransition};
pub use display::{
    format_countdown, is_stale, CategoryDisplay, CountdownStyle, DisplayModel, ErrorDisplay,
};
pub use history::{RateEstimate, SnapshotHistory, UsageSnapshot};
pub use provider::{UsageError, UsageProvider};
pub use reconciler::{LastFetch, ReconcileOutcome, UsageReconciler};
pub use scheduler::{DynamicRefreshState, RefreshLadder, RefreshTrend};
pub use settings::{UsageSettings, SETTING_KEYS};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use timer::{create_shared_state, PollingState, PollingStatus, SharedPollingState};
pub use types::{ExtraCredits, UsageCategory, UsagePayload, UsagePoint};
