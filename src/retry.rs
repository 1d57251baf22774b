//! Retry, backoff and cooldown policy for provider calls

use crate::config::SnapshotConfig;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// How the chain reacts to a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Rate limiting, server errors, timeouts, connection errors.
    /// Retried with backoff; exhausting retries puts the provider in cooldown.
    Transient,
    /// Client errors and malformed responses.
    /// Fall through to the next provider without retry or cooldown.
    Permanent,
}

/// Exponential backoff bounds for a single provider within one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Whether a failure on retry number `attempt` (0-based) should be retried
    pub fn should_retry(&self, class: FailureClass, attempt: u32) -> bool {
        class == FailureClass::Transient && attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SnapshotConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CooldownKey {
    provider_id: String,
    network: String,
}

/// An active cooldown for one provider on one network
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownEntry {
    pub provider_id: String,
    pub network: String,
    pub remaining_ms: u64,
}

/// Cooldown windows keyed by `(provider, network)`
///
/// Entries expire on their own; lookups ignore anything past its deadline.
pub struct CooldownRegistry {
    until: RwLock<HashMap<CooldownKey, Instant>>,
    duration: Duration,
}

impl CooldownRegistry {
    pub fn new(duration: Duration) -> Self {
        Self {
            until: RwLock::new(HashMap::new()),
            duration,
        }
    }

    /// Time left on the cooldown, if one is active
    pub fn remaining(&self, provider_id: &str, network: &str) -> Option<Duration> {
        let key = CooldownKey {
            provider_id: provider_id.to_string(),
            network: network.to_string(),
        };
        let deadline = *self.until.read().get(&key)?;
        let now = Instant::now();
        (deadline > now).then(|| deadline - now)
    }

    pub fn is_cooling_down(&self, provider_id: &str, network: &str) -> bool {
        self.remaining(provider_id, network).is_some()
    }

    /// Starts (or extends) a cooldown of the configured length
    pub fn start(&self, provider_id: &str, network: &str) {
        let deadline = Instant::now() + self.duration;
        let mut until = self.until.write();
        until.retain(|_, d| *d > Instant::now());
        until.insert(
            CooldownKey {
                provider_id: provider_id.to_string(),
                network: network.to_string(),
            },
            deadline,
        );
        tracing::info!(
            provider = provider_id,
            network = network,
            cooldown_ms = self.duration.as_millis() as u64,
            "Provider entered cooldown"
        );
    }

    /// Ends the cooldown early, e.g. after a success
    pub fn clear(&self, provider_id: &str, network: &str) {
        let key = CooldownKey {
            provider_id: provider_id.to_string(),
            network: network.to_string(),
        };
        if self.until.write().remove(&key).is_some() {
            tracing::debug!(provider = provider_id, network = network, "Cooldown cleared");
        }
    }

    pub fn clear_all(&self) {
        self.until.write().clear();
    }

    /// Currently active cooldowns
    pub fn active(&self) -> Vec<CooldownEntry> {
        let now = Instant::now();
        let mut active: Vec<CooldownEntry> = self
            .until
            .read()
            .iter()
            .filter(|(_, deadline)| **deadline > now)
            .map(|(key, deadline)| CooldownEntry {
                provider_id: key.provider_id.clone(),
                network: key.network.clone(),
                remaining_ms: (*deadline - now).as_millis() as u64,
            })
            .collect();
        active.sort_by(|a, b| {
            (a.provider_id.as_str(), a.network.as_str())
                .cmp(&(b.provider_id.as_str(), b.network.as_str()))
        });
        active
    }
}
