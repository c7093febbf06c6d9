//! Key-value persistence
//!
//! The reconciler persists its state as JSON strings under a handful of
//! keys so the rate estimator keeps its baseline across restarts. Read
//! failures degrade to the default value; write failures are logged and
//! swallowed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

// ============================================================================
// Keys
// ============================================================================

/// Snapshot history of the primary category
pub const KEY_HISTORY: &str = "usage.history";
/// Last seen reset timestamp of the primary category
pub const KEY_CYCLE_MARKER: &str = "usage.cycle_marker";
/// Fired thresholds and per-category previous percentages
pub const KEY_ALERTS: &str = "usage.alerts";
/// Adaptive polling state
pub const KEY_DYNAMIC_REFRESH: &str = "usage.dynamic_refresh";
/// Last successful payload and when it was fetched
pub const KEY_LAST_FETCH: &str = "usage.last_fetch";
/// User settings
pub const KEY_SETTINGS: &str = "settings";

/// Keys holding usage state (everything except settings)
pub const STATE_KEYS: [&str; 5] = [
    KEY_HISTORY,
    KEY_CYCLE_MARKER,
    KEY_ALERTS,
    KEY_DYNAMIC_REFRESH,
    KEY_LAST_FETCH,
];

// ============================================================================
// Store Trait
// ============================================================================

/// String-keyed persistent store
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<()>;

    fn delete(&mut self, key: &str) -> Result<()>;
}

/// Read and deserialize a value, falling back to `T::default()`
pub fn load_json<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(key) else {
        return T::default();
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("[usage:store] Discarding unreadable value for {}: {}", key, e);
            T::default()
        }
    }
}

/// Serialize and write a value; failures are logged, not returned
pub fn save_json<T>(store: &mut dyn KeyValueStore, key: &str, value: &T)
where
    T: Serialize + ?Sized,
{
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("[usage:store] Failed to serialize {}: {}", key, e);
            return;
        }
    };
    if let Err(e) = store.set(key, raw) {
        log::warn!("[usage:store] Failed to persist {}: {}", key, e);
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store, for tests and ephemeral runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

// ============================================================================
// JsonFileStore
// ============================================================================

/// Store backed by a single JSON object file
///
/// The whole map is rewritten on every change through a temporary file and
/// a rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`
    ///
    /// A missing file is an empty store. An unreadable one is logged and
    /// treated as empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let values = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!(
                    "[usage:store] Ignoring corrupt state file {:?}: {}",
                    path,
                    e
                );
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::store(format!("cannot read {:?}: {}", path, e))),
        };

        log::debug!(
            "[usage:store] Opened {:?} with {} keys",
            path,
            values.len()
        );
        Ok(Self { path, values })
    }

    /// Default location: `<data dir>/quotabar/state.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quotabar")
            .join("state.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
