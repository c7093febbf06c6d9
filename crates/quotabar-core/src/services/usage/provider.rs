//! Usage provider trait and fetch error taxonomy
//!
//! Every failure a fetch can produce is one of five kinds. All of them are
//! recoverable: the reconciler keeps its last known good state and the next
//! scheduled poll simply tries again.

use async_trait::async_trait;
use thiserror::Error;

use super::types::UsagePayload;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when fetching usage information
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// No credential found (tool not installed or never signed in)
    #[error("Credentials not found")]
    CredentialNotFound,

    /// A credential exists but could not be read or parsed
    #[error("Credentials unreadable")]
    CredentialUnreadable,

    /// Transport-level failure (DNS, connect, timeout, TLS)
    #[error("Network error: {0}")]
    NetworkFailure(String),

    /// The API answered with a non-2xx status
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// The response body did not have the expected shape
    #[error("Decode error: {0}")]
    DecodeFailure(String),
}

impl UsageError {
    /// Short token for the compact status display
    pub fn token(&self) -> &'static str {
        match self {
            UsageError::CredentialNotFound | UsageError::CredentialUnreadable => "key?",
            UsageError::NetworkFailure(_) => "network?",
            UsageError::HttpStatus(401) | UsageError::HttpStatus(403) => "auth?",
            UsageError::HttpStatus(429) => "rate limit?",
            UsageError::HttpStatus(_) => "http?",
            UsageError::DecodeFailure(_) => "json?",
        }
    }

    /// Full description for the expanded view
    pub fn description(&self) -> String {
        match self {
            UsageError::CredentialNotFound => {
                "No credentials found. The usage source is not installed or not signed in."
                    .to_string()
            }
            UsageError::CredentialUnreadable => {
                "Credentials were found but could not be read.".to_string()
            }
            UsageError::NetworkFailure(cause) => format!("Network request failed: {}", cause),
            UsageError::HttpStatus(code @ (401 | 403)) => {
                format!("The usage API rejected the access token (HTTP {}).", code)
            }
            UsageError::HttpStatus(429) => {
                "The usage API is rate limiting requests (HTTP 429).".to_string()
            }
            UsageError::HttpStatus(code) => format!("The usage API returned HTTP {}.", code),
            UsageError::DecodeFailure(cause) => {
                format!("Unexpected response from the usage API: {}", cause)
            }
        }
    }

    /// Optional remediation hint
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            UsageError::CredentialNotFound => {
                Some("Install Claude Code and sign in with 'claude /login'.")
            }
            UsageError::CredentialUnreadable => {
                Some("Re-authenticate with 'claude /login' to rewrite the stored credentials.")
            }
            UsageError::NetworkFailure(_) => Some("Check your internet connection."),
            UsageError::HttpStatus(401) | UsageError::HttpStatus(403) => Some(
                "Token expired. Try 'claude setup-token' for a long-lived token, or re-login with 'claude /login'.",
            ),
            UsageError::HttpStatus(429) => {
                Some("Polling is too frequent; consider a longer refresh interval.")
            }
            UsageError::HttpStatus(_) => None,
            UsageError::DecodeFailure(_) => {
                Some("The usage API may have changed; check for an update.")
            }
        }
    }

    /// Whether this is the provider telling us to back off
    ///
    /// Front ends render it with an alternate color.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UsageError::HttpStatus(429))
    }
}

impl From<reqwest::Error> for UsageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UsageError::DecodeFailure(err.to_string())
        } else if err.is_timeout() {
            UsageError::NetworkFailure("Request timed out".to_string())
        } else if err.is_connect() {
            UsageError::NetworkFailure("Connection failed".to_string())
        } else if let Some(status) = err.status() {
            UsageError::HttpStatus(status.as_u16())
        } else {
            UsageError::NetworkFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UsageError {
    fn from(err: serde_json::Error) -> Self {
        UsageError::DecodeFailure(err.to_string())
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Trait for usage data providers
///
/// A provider owns credential lookup and the HTTP call. The reconciler never
/// calls it; the caller does, then hands the result over.
#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Unique identifier for this provider
    fn provider_id(&self) -> &'static str;

    /// Human-readable display name for this provider
    fn display_name(&self) -> &'static str {
        self.provider_id()
    }

    /// Fetch current usage from the provider
    ///
    /// # Errors
    ///
    /// Returns the `UsageError` kind matching the failure.
    async fn fetch_usage(&self) -> Result<UsagePayload, UsageError>;

    /// Check if credentials are available without making a network request
    async fn is_available(&self) -> bool;
}

// ============================================================================
// Tests
// ============================================================================
