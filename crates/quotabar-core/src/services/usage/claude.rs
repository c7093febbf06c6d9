//! Claude Code usage provider
//!
//! Implements [`UsageProvider`] against Anthropic's OAuth usage API.
//!
//! # Overview
//!
//! The OAuth access token is read with the following priority:
//!
//! 1. **Manual token** - passed on the command line or via environment
//! 2. **System credential store**:
//!    - **macOS**: Keychain under service "Claude Code-credentials"
//!    - **Windows**: Credential Manager under service "Claude Code-credentials"
//! 3. **File fallback**: `~/.claude/.credentials.json`
//!
//! Anthropic's OAuth tokens cannot be refreshed from here. An expired token
//! shows up as HTTP 401 and the user has to run `claude /login` again.
//!
//! # Usage Windows
//!
//! - **five_hour**: rolling rate limit window (the primary category)
//! - **seven_day**: weekly usage, all models
//! - **seven_day_opus** / **seven_day_sonnet**: weekly usage per model family
//! - **extra_usage**: pay-as-you-go credits, when enabled on the account

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::provider::{UsageError, UsageProvider};
use super::types::{UsageCategory, UsagePayload, UsagePoint};

// ============================================================================
// Constants
// ============================================================================

/// Anthropic API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// OAuth usage endpoint, relative to the base URL
const USAGE_API_PATH: &str = "/api/oauth/usage";

/// OAuth beta header value for API access
const OAUTH_BETA_HEADER: &str = "oauth-2025-04-20";

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("quotabar/", env!("CARGO_PKG_VERSION"));

/// Service name Claude Code uses in the system credential store
#[cfg(any(target_os = "macos", target_os = "windows"))]
const CREDENTIAL_SERVICE: &str = "Claude Code-credentials";

// ============================================================================
// Credentials Types
// ============================================================================

/// Claude credentials file structure (~/.claude/.credentials.json)
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "claudeAiOauth")]
    claude_ai_oauth: Option<ClaudeOAuthCredentials>,
}

#[derive(Debug, Deserialize)]
struct ClaudeOAuthCredentials {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,

    /// Expiration time in milliseconds since epoch
    #[serde(rename = "expiresAt")]
    expires_at: Option<i64>,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Response from Anthropic's OAuth usage API
#[derive(Debug, Deserialize)]
struct OAuthUsageResponse {
    five_hour: Option<UsageWindow>,
    seven_day: Option<UsageWindow>,
    seven_day_opus: Option<UsageWindow>,
    seven_day_sonnet: Option<UsageWindow>,
    extra_usage: Option<ExtraUsage>,
}

/// A single usage window from the API
#[derive(Debug, Deserialize)]
struct UsageWindow {
    /// Utilization as a percentage (28.0 for 28%)
    utilization: Option<f64>,
    resets_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtraUsage {
    is_enabled: Option<bool>,
    used_credits: Option<f64>,
    monthly_limit: Option<f64>,
}

// ============================================================================
// ClaudeUsageProvider
// ============================================================================

/// Usage provider for Claude Code
pub struct ClaudeUsageProvider {
    /// Path to credentials file (fallback)
    credentials_path: PathBuf,

    /// HTTP client for API requests
    client: Client,

    /// API base URL, overridable for tests
    base_url: String,

    /// Manual OAuth token (highest priority)
    manual_token: Option<String>,

    /// Whether to consult the Keychain / Credential Manager
    use_system_store: bool,
}

impl ClaudeUsageProvider {
    /// Create a provider with automatic credential discovery
    pub fn new() -> Self {
        Self::with_credentials_path(Self::default_credentials_path())
    }

    /// Create a provider reading credentials from a custom file
    pub fn with_credentials_path(credentials_path: PathBuf) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            credentials_path,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            manual_token: None,
            use_system_store: true,
        }
    }

    /// Set a manual OAuth token (highest priority)
    pub fn with_manual_token(mut self, token: Option<String>) -> Self {
        self.manual_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Point the provider at another API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Skip the Keychain / Credential Manager lookup
    pub fn without_system_store(mut self) -> Self {
        self.use_system_store = false;
        self
    }

    fn default_credentials_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join(".credentials.json")
    }

    fn usage_url(&self) -> String {
        format!("{}{}", self.base_url, USAGE_API_PATH)
    }

    /// Load the OAuth access token (blocking)
    pub fn load_oauth_token(&self) -> Result<String, UsageError> {
        if let Some(ref token) = self.manual_token {
            log::debug!("[usage:claude] Using manually configured OAuth token");
            return Ok(token.clone());
        }

        if self.use_system_store {
            match Self::load_from_system_store() {
                Ok(Some(token)) => {
                    log::debug!("[usage:claude] Loaded OAuth token from system credential store");
                    return Ok(token);
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!(
                        "[usage:claude] System credential store lookup failed: {}, trying file fallback",
                        e
                    );
                }
            }
        }

        self.load_from_file()
    }

    /// Read the credentials JSON from the macOS Keychain
    #[cfg(target_os = "macos")]
    fn load_from_system_store() -> Result<Option<String>, UsageError> {
        use security_framework::passwords::get_generic_password;

        let username = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
        let bytes = match get_generic_password(CREDENTIAL_SERVICE, &username) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("[usage:claude] Keychain access failed: {}", e);
                return Ok(None);
            }
        };

        let content =
            String::from_utf8(bytes.to_vec()).map_err(|_| UsageError::CredentialUnreadable)?;
        parse_credentials_json(&content).map(Some)
    }

    /// Read the credentials JSON from the Windows Credential Manager
    #[cfg(target_os = "windows")]
    fn load_from_system_store() -> Result<Option<String>, UsageError> {
        use keyring::Entry;

        let username = std::env::var("USERNAME").unwrap_or_else(|_| "default".to_string());
        let entry = match Entry::new(CREDENTIAL_SERVICE, &username) {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("[usage:claude] Failed to create keyring entry: {}", e);
                return Ok(None);
            }
        };

        match entry.get_password() {
            Ok(content) => parse_credentials_json(&content).map(Some),
            Err(e) => {
                log::debug!("[usage:claude] Credential Manager access failed: {}", e);
                Ok(None)
            }
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn load_from_system_store() -> Result<Option<String>, UsageError> {
        Ok(None)
    }

    fn load_from_file(&self) -> Result<String, UsageError> {
        log::debug!(
            "[usage:claude] Loading OAuth token from file: {:?}",
            self.credentials_path
        );

        let content = match std::fs::read_to_string(&self.credentials_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "[usage:claude] Credentials file not found: {:?}",
                    self.credentials_path
                );
                return Err(UsageError::CredentialNotFound);
            }
            Err(e) => {
                log::warn!("[usage:claude] Cannot read credentials file: {}", e);
                return Err(UsageError::CredentialUnreadable);
            }
        };

        parse_credentials_json(&content)
    }

    /// Call the Anthropic usage API
    async fn call_usage_api(&self, token: &str) -> Result<OAuthUsageResponse, UsageError> {
        log::info!("[usage:claude] Fetching usage from Anthropic API");

        let response = self
            .client
            .get(self.usage_url())
            .bearer_auth(token)
            .header("Accept", "application/json")
            .header("anthropic-beta", OAUTH_BETA_HEADER)
            .send()
            .await?;

        let status = response.status();
        log::debug!("[usage:claude] API response status: {}", status);

        if !status.is_success() {
            log::warn!("[usage:claude] API error: HTTP {}", status);
            return Err(UsageError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        log::debug!(
            "[usage:claude] API response body: {}",
            body.chars().take(200).collect::<String>()
        );

        let usage: OAuthUsageResponse = serde_json::from_str(&body).map_err(|e| {
            log::error!("[usage:claude] Failed to parse API response: {}", e);
            UsageError::from(e)
        })?;

        Ok(usage)
    }
}

impl Default for ClaudeUsageProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the access token from a credentials document
fn parse_credentials_json(content: &str) -> Result<String, UsageError> {
    let file: CredentialsFile = serde_json::from_str(content).map_err(|e| {
        log::error!("[usage:claude] Failed to parse credentials: {}", e);
        UsageError::CredentialUnreadable
    })?;

    let Some(oauth) = file.claude_ai_oauth else {
        log::warn!("[usage:claude] No claudeAiOauth object in credentials");
        return Err(UsageError::CredentialNotFound);
    };

    if let Some(expires_at) = oauth.expires_at {
        if expires_at < chrono::Utc::now().timestamp_millis() {
            log::debug!("[usage:claude] Stored token looks expired; trying it anyway");
        }
    }

    match oauth.access_token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => {
            log::warn!("[usage:claude] No access token in credentials");
            Err(UsageError::CredentialUnreadable)
        }
    }
}

/// Convert an API response to a payload
fn response_to_payload(response: OAuthUsageResponse) -> UsagePayload {
    let windows = [
        (UsageCategory::FiveHour, response.five_hour),
        (UsageCategory::SevenDay, response.seven_day),
        (UsageCategory::SevenDaySonnet, response.seven_day_sonnet),
        (UsageCategory::SevenDayOpus, response.seven_day_opus),
    ];

    let mut payload = UsagePayload::new();
    for (category, window) in windows {
        let Some(window) = window else { continue };
        let Some(utilization) = window.utilization else {
            continue;
        };
        let mut point = UsagePoint::new(utilization);
        if let Some(resets_at) = window.resets_at {
            point = point.with_resets_at(resets_at);
        }
        payload = payload.with_point(category, point);
    }

    if let Some(extra) = response.extra_usage {
        if extra.is_enabled == Some(true) {
            if let (Some(used), Some(limit)) = (extra.used_credits, extra.monthly_limit) {
                payload = payload.with_extra_credits(used, limit);
                if limit > 0.0 {
                    let utilization = (used / limit * 100.0).clamp(0.0, 100.0);
                    payload = payload.with_point(UsageCategory::Extra, UsagePoint::new(utilization));
                }
            }
        }
    }

    log::debug!(
        "[usage:claude] Converted response to {} categories",
        payload.points.len()
    );
    payload
}

// ============================================================================
// UsageProvider Implementation
// ============================================================================

#[async_trait]
impl UsageProvider for ClaudeUsageProvider {
    fn provider_id(&self) -> &'static str {
        "claude"
    }

    fn display_name(&self) -> &'static str {
        "Claude Code"
    }

    async fn fetch_usage(&self) -> Result<UsagePayload, UsageError> {
        let token = self.load_oauth_token()?;
        let response = self.call_usage_api(&token).await?;
        let payload = response_to_payload(response);

        if payload.is_empty() {
            log::warn!("[usage:claude] No usage data returned from API");
        }

        Ok(payload)
    }

    async fn is_available(&self) -> bool {
        match self.load_oauth_token() {
            Ok(_) => true,
            Err(e) => {
                log::debug!("[usage:claude] Provider not available: {}", e);
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
