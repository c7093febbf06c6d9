//! Services module

pub mod usage;

pub use usage::{
    ClaudeUsageProvider, DisplayModel, JsonFileStore, KeyValueStore, LogNotifier, MemoryStore,
    Notifier, ReconcileOutcome, UsageCategory, UsageError, UsagePayload, UsageProvider,
    UsageReconciler, UsageSettings,
};
