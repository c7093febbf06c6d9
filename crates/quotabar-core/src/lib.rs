//! # quotabar-core
//!
//! Core polling and reconciliation logic for quotabar - shared by every
//! front end.
//!
//! This crate provides:
//! - Usage fetching, reconciliation, alerts and adaptive polling (`services::usage`)
//! - Unified error handling (`error` module)

pub mod error;
pub mod services;

// Re-exports for convenience
pub use error::{Error, Result};

pub use services::{
    ClaudeUsageProvider, DisplayModel, JsonFileStore, KeyValueStore, LogNotifier, MemoryStore,
    Notifier, ReconcileOutcome, UsageCategory, UsageError, UsagePayload, UsageProvider,
    UsageReconciler, UsageSettings,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
