//! Runtime configuration for the snapshot orchestrator

use crate::{
    constants::{
        DEFAULT_BASE_BACKOFF_MS, DEFAULT_COOLDOWN_MS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RETRIES,
        DEFAULT_PROVIDER_PRIORITY, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STALE_WHILE_REVALIDATE_MS,
        DEFAULT_TTL_MS,
    },
    error::SnapshotError,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Tunables for caching, retries and provider selection
///
/// Every field has a default from [`constants`](crate::constants), so a
/// partial JSON/YAML document deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotConfig {
    /// Freshness window
    pub ttl_ms: u64,
    /// Extra window after the TTL in which stale data is served while refreshing
    pub stale_while_revalidate_ms: u64,
    /// Retries per provider per request for transient failures
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// How long a provider is skipped for a chain after exhausting retries
    pub cooldown_ms: u64,
    /// Bound on every individual provider call
    pub request_timeout_ms: u64,
    /// Provider ids in preference order; unlisted providers go last
    pub provider_priority: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            stale_while_revalidate_ms: DEFAULT_STALE_WHILE_REVALIDATE_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            provider_priority: DEFAULT_PROVIDER_PRIORITY
                .iter()
                .map(|id| id.to_string())
                .collect(),
        }
    }
}

impl SnapshotConfig {
    /// Loads configuration from `MARKET_SNAPSHOT_*` environment variables
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, SnapshotError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SnapshotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "MARKET_SNAPSHOT_TTL_MS")? {
            config.ttl_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SNAPSHOT_SWR_MS")? {
            config.stale_while_revalidate_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SNAPSHOT_MAX_RETRIES")? {
            config.max_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SNAPSHOT_BASE_BACKOFF_MS")? {
            config.base_backoff_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SNAPSHOT_MAX_BACKOFF_MS")? {
            config.max_backoff_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SNAPSHOT_COOLDOWN_MS")? {
            config.cooldown_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "MARKET_SNAPSHOT_REQUEST_TIMEOUT_MS")? {
            config.request_timeout_ms = v;
        }
        if let Some(list) = lookup("MARKET_SNAPSHOT_PROVIDERS") {
            config.provider_priority = list
                .split(',')
                .map(|id| id.trim().to_lowercase())
                .filter(|id| !id.is_empty())
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values that would make the orchestrator unusable
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.ttl_ms == 0 {
            return Err(SnapshotError::config("ttlMs must be greater than zero"));
        }
        if self.request_timeout_ms == 0 {
            return Err(SnapshotError::config(
                "requestTimeoutMs must be greater than zero",
            ));
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(SnapshotError::config(format!(
                "baseBackoffMs ({}) exceeds maxBackoffMs ({})",
                self.base_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn stale_while_revalidate(&self) -> Duration {
        Duration::from_millis(self.stale_while_revalidate_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, SnapshotError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SnapshotError::config(format!("{name}={raw:?}: {e}"))),
    }
}
