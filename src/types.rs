//! Types for the market snapshot orchestrator

use crate::error::ProviderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key for a token on a specific chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenKey {
    /// Token contract / mint address
    pub address: String,
    /// Chain (network) identifier, e.g. `solana`, `ethereum`, `base`
    pub chain: String,
}

impl TokenKey {
    /// Create a new token key
    pub fn new(address: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            chain: chain.into(),
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

/// Identity of the token a snapshot describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub chain: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
}

impl TokenInfo {
    /// Create token info without symbol or name
    pub fn new(address: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            chain: chain.into(),
            symbol: None,
            name: None,
        }
    }
}

/// Provenance of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Provider id that produced the snapshot
    pub provider: String,

    /// When the provider produced it
    pub timestamp: DateTime<Utc>,

    /// Whether the snapshot was served from cache
    pub cached: bool,

    /// Provider-specific confidence in the quote (0.0 to 1.0)
    pub confidence: f64,
}

/// Normalized point-in-time market data for one token on one chain
///
/// Produced once by a provider adapter and treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub token: TokenInfo,

    /// Price in USD
    pub price: f64,

    /// 24h traded volume in USD
    pub volume: f64,

    /// Pool liquidity in USD
    pub liquidity: f64,

    pub metadata: SnapshotMetadata,
}

impl MarketSnapshot {
    /// Create a new snapshot stamped with the current time
    pub fn new(
        token: TokenInfo,
        price: f64,
        volume: f64,
        liquidity: f64,
        provider: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            token,
            price,
            volume,
            liquidity,
            metadata: SnapshotMetadata {
                provider: provider.into(),
                timestamp: Utc::now(),
                cached: false,
                confidence: confidence.clamp(0.0, 1.0),
            },
        }
    }

    /// Rejects zero-valued or nonsensical quotes
    ///
    /// Adapters must fail instead of returning placeholders, so a snapshot that
    /// slips through with a non-positive price is treated as a malformed response.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ProviderError::InvalidResponse(format!(
                "non-positive price {} from {}",
                self.price, self.metadata.provider
            )));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(ProviderError::InvalidResponse(format!(
                "invalid volume {} from {}",
                self.volume, self.metadata.provider
            )));
        }
        if !self.liquidity.is_finite() || self.liquidity < 0.0 {
            return Err(ProviderError::InvalidResponse(format!(
                "invalid liquidity {} from {}",
                self.liquidity, self.metadata.provider
            )));
        }
        Ok(())
    }

    /// Get the age of the snapshot
    pub fn age(&self) -> std::time::Duration {
        let duration = Utc::now().signed_duration_since(self.metadata.timestamp);
        duration.to_std().unwrap_or_default()
    }
}

/// Snapshot as handed to callers of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedSnapshot {
    #[serde(flatten)]
    pub snapshot: MarketSnapshot,

    /// Provider id that produced the data
    pub provider: String,

    /// Served from cache (fresh or stale) rather than a provider call made for this request
    pub cached: bool,
}

impl AnnotatedSnapshot {
    pub(crate) fn new(mut snapshot: MarketSnapshot, cached: bool) -> Self {
        snapshot.metadata.cached = cached;
        let provider = snapshot.metadata.provider.clone();
        Self {
            snapshot,
            provider,
            cached,
        }
    }

    /// Price in USD
    pub fn price(&self) -> f64 {
        self.snapshot.price
    }
}

/// Provider status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Provider is healthy
    Healthy,
    /// Provider is experiencing issues
    Degraded,
    /// Provider is unavailable
    Unavailable,
}

/// Overall system health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// System is healthy and all components are operational
    Healthy,
    /// System is degraded but still functional
    Degraded,
    /// System is unhealthy and requires attention
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
