//! Error types for the Market Snapshot SDK

use crate::cache::FetchPanicked;
use crate::retry::FailureClass;
use std::time::Duration;
use thiserror::Error;

/// Errors a provider adapter reports when it cannot produce a snapshot
///
/// Adapters must return one of these rather than an empty placeholder. The
/// variants carry enough of the HTTP status for the retry controller to tell
/// rate limiting and server faults apart from permanent client errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Connection-level failure (DNS, TLS, reset, ...)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-success HTTP status other than 429
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Attempt did not complete within the request timeout
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Malformed or unparseable response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider has no market for this token
    #[error("Token not supported: {0}")]
    UnsupportedToken(String),
}

impl ProviderError {
    /// Builds an error from a non-success HTTP status
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        if status == 429 {
            Self::RateLimitExceeded
        } else {
            Self::Http {
                status,
                message: body.into(),
            }
        }
    }

    /// HTTP-status-like discriminator, when one is known
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RateLimitExceeded => Some(429),
            _ => None,
        }
    }

    /// Classifies the error for the retry controller
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::RateLimitExceeded | Self::Timeout(_) | Self::NetworkError(_) => {
                FailureClass::Transient
            }
            Self::Http { status, .. } if *status >= 500 => FailureClass::Transient,
            Self::Http { .. } | Self::InvalidResponse(_) | Self::UnsupportedToken(_) => {
                FailureClass::Permanent
            }
        }
    }

    /// True for errors worth retrying against the same provider
    pub fn is_transient(&self) -> bool {
        self.failure_class() == FailureClass::Transient
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

/// Outcome of one provider during a single resolve
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAttempt {
    pub provider_id: String,
    /// Number of network calls made (0 when skipped)
    pub calls: u32,
    /// Provider was in cooldown and never called
    pub skipped: bool,
    pub error: Option<ProviderError>,
}

/// Errors returned to callers of the snapshot orchestrator
///
/// Cloneable so every caller joined on one in-flight fetch observes the same
/// failure.
#[derive(Debug, Error, Clone)]
pub enum SnapshotError {
    /// Every candidate was tried (or skipped) and none succeeded
    #[error("All providers failed; last provider {provider}: {reason}")]
    Exhausted {
        provider: String,
        reason: ProviderError,
        attempts: Vec<ProviderAttempt>,
    },

    /// No provider could be tried because all of them are cooling down
    #[error("All providers are cooling down: {}", .skipped.join(", "))]
    AllCoolingDown { skipped: Vec<String> },

    /// The orchestrator has no providers configured
    #[error("No providers configured")]
    NoProviders,

    /// The request itself is unusable (e.g. empty address)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A provider adapter panicked while fetching
    #[error("Snapshot fetch panicked: {0}")]
    FetchPanicked(String),
}

impl From<FetchPanicked> for SnapshotError {
    fn from(panicked: FetchPanicked) -> Self {
        Self::FetchPanicked(panicked.message)
    }
}

impl SnapshotError {
    /// Creates an InvalidRequest error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a Config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Provider that was attempted last, if any
    pub fn last_provider(&self) -> Option<&str> {
        match self {
            Self::Exhausted { provider, .. } => Some(provider),
            _ => None,
        }
    }
}
