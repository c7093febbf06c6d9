//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod config;
pub mod history;
pub mod reset;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use quotabar_core::services::usage::{ClaudeUsageProvider, JsonFileStore, UsageReconciler};

use crate::output::{OutputFormat, TerminalNotifier};

/// Name of the state file inside the state directory
const STATE_FILE: &str = "state.json";

/// Shared context for all commands
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
    pub state_dir: PathBuf,
    pub token: Option<String>,
    pub api_url: Option<String>,
}

impl Context {
    pub fn new(
        format: OutputFormat,
        quiet: bool,
        state_dir: Option<&str>,
        token: Option<String>,
        api_url: Option<String>,
    ) -> Self {
        let state_dir = match state_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => default_state_dir(),
        };
        Self {
            format,
            quiet,
            state_dir,
            token,
            api_url,
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    pub fn open_store(&self) -> Result<JsonFileStore> {
        let path = self.state_path();
        JsonFileStore::open(&path).with_context(|| format!("Failed to open state file {:?}", path))
    }

    /// Reconciler backed by the state file, notifying on the terminal
    pub fn reconciler(&self) -> Result<UsageReconciler> {
        let store = self.open_store()?;
        Ok(UsageReconciler::load(store, TerminalNotifier::new(self.quiet)))
    }

    pub fn provider(&self) -> ClaudeUsageProvider {
        let provider = ClaudeUsageProvider::new().with_manual_token(self.token.clone());
        match &self.api_url {
            Some(url) => provider.with_base_url(url.as_str()),
            None => provider,
        }
    }
}

fn default_state_dir() -> PathBuf {
    JsonFileStore::default_path()
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
