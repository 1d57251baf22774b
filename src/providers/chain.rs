//! Health-ranked provider chain with retry and cooldown

use crate::{
    error::{ProviderAttempt, ProviderError, SnapshotError},
    health::HealthTracker,
    provider::{MarketSnapshotProvider, ProviderRequest},
    retry::{CooldownRegistry, FailureClass, RetryPolicy},
    types::MarketSnapshot,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

/// Successful resolve and what it took to get there
#[derive(Debug, Clone)]
pub struct ResolvedSnapshot {
    pub snapshot: MarketSnapshot,
    pub provider_id: String,
    pub attempts: Vec<ProviderAttempt>,
}

/// Tries providers in health order until one returns a snapshot
///
/// Each resolve walks `SELECT_NEXT -> (skip | attempt) -> (success | failure)`:
/// the remaining candidates are re-ranked after every failure, providers in
/// cooldown for the requested chain are skipped without a network call, and
/// the first success ends the walk.
pub struct ProviderChain {
    /// Priority order, used as the stable base order for ranking
    providers: Vec<Arc<dyn MarketSnapshotProvider>>,
    health: Arc<HealthTracker>,
    cooldowns: Arc<CooldownRegistry>,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl ProviderChain {
    /// Creates a chain over `providers`
    ///
    /// Providers named in `priority` come first in that order; the rest keep
    /// their registration order.
    pub fn new(
        providers: Vec<Arc<dyn MarketSnapshotProvider>>,
        priority: &[String],
        health: Arc<HealthTracker>,
        cooldowns: Arc<CooldownRegistry>,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        let mut providers = providers;
        providers.sort_by_key(|p| {
            priority
                .iter()
                .position(|id| id == p.provider_id())
                .unwrap_or(usize::MAX)
        });

        Self {
            providers,
            health,
            cooldowns,
            retry,
            request_timeout,
        }
    }

    /// Provider ids in priority order
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.provider_id().to_string())
            .collect()
    }

    fn provider(&self, id: &str) -> Option<&Arc<dyn MarketSnapshotProvider>> {
        self.providers.iter().find(|p| p.provider_id() == id)
    }

    /// Returns the first snapshot any provider produces for `(address, chain)`
    pub async fn resolve(
        &self,
        address: &str,
        chain: &str,
    ) -> Result<ResolvedSnapshot, SnapshotError> {
        if self.providers.is_empty() {
            return Err(SnapshotError::NoProviders);
        }

        let mut remaining = self.provider_ids();
        let mut attempts = Vec::with_capacity(remaining.len());
        let mut last_failure: Option<(String, ProviderError)> = None;

        loop {
            let mut next = None;
            for id in self.health.rank(&remaining) {
                if let Some(left) = self.cooldowns.remaining(&id, chain) {
                    tracing::debug!(
                        provider = %id,
                        chain = chain,
                        remaining_ms = left.as_millis() as u64,
                        "Skipping provider in cooldown"
                    );
                    attempts.push(ProviderAttempt {
                        provider_id: id.clone(),
                        calls: 0,
                        skipped: true,
                        error: None,
                    });
                    remaining.retain(|r| r != &id);
                } else {
                    next = Some(id);
                    break;
                }
            }

            let Some(id) = next else { break };
            remaining.retain(|r| r != &id);
            let Some(provider) = self.provider(&id) else { continue };

            match self.attempt(provider.as_ref(), address, chain).await {
                Ok((snapshot, calls)) => {
                    attempts.push(ProviderAttempt {
                        provider_id: id.clone(),
                        calls,
                        skipped: false,
                        error: None,
                    });
                    return Ok(ResolvedSnapshot {
                        snapshot,
                        provider_id: id,
                        attempts,
                    });
                }
                Err((error, calls)) => {
                    attempts.push(ProviderAttempt {
                        provider_id: id.clone(),
                        calls,
                        skipped: false,
                        error: Some(error.clone()),
                    });
                    last_failure = Some((id, error));
                }
            }
        }

        match last_failure {
            Some((provider, reason)) => {
                tracing::warn!(
                    address = address,
                    chain = chain,
                    last_provider = %provider,
                    error = %reason,
                    "All providers failed"
                );
                Err(SnapshotError::Exhausted {
                    provider,
                    reason,
                    attempts,
                })
            }
            None => {
                let skipped: Vec<String> = attempts.into_iter().map(|a| a.provider_id).collect();
                tracing::warn!(
                    address = address,
                    chain = chain,
                    skipped = ?skipped,
                    "Every provider is cooling down"
                );
                Err(SnapshotError::AllCoolingDown { skipped })
            }
        }
    }

    /// Calls one provider, retrying transient failures with backoff
    ///
    /// Returns the snapshot or the final error, together with the number of
    /// network calls made.
    async fn attempt(
        &self,
        provider: &dyn MarketSnapshotProvider,
        address: &str,
        chain: &str,
    ) -> Result<(MarketSnapshot, u32), (ProviderError, u32)> {
        let id = provider.provider_id();
        let request = ProviderRequest {
            timeout: self.request_timeout,
        };
        let mut retry = 0u32;

        loop {
            let started = Instant::now();
            let outcome = match timeout(
                self.request_timeout,
                provider.fetch_snapshot(address, chain, request),
            )
            .await
            {
                Ok(Ok(snapshot)) => snapshot.validate().map(|_| snapshot),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ProviderError::Timeout(self.request_timeout)),
            };
            let calls = retry + 1;

            let error = match outcome {
                Ok(snapshot) => {
                    let latency = started.elapsed();
                    self.health.record_success(id, latency);
                    self.cooldowns.clear(id, chain);
                    tracing::debug!(
                        provider = id,
                        chain = chain,
                        address = address,
                        latency_ms = latency.as_millis() as u64,
                        "Fetched snapshot"
                    );
                    return Ok((snapshot, calls));
                }
                Err(error) => error,
            };

            self.health.record_failure(id, &error);
            let class = error.failure_class();

            if self.retry.should_retry(class, retry) {
                let delay = self.retry.backoff_for(retry);
                tracing::warn!(
                    provider = id,
                    chain = chain,
                    attempt = calls,
                    max_attempts = self.retry.max_retries + 1,
                    backoff_ms = delay.as_millis() as u64,
                    error = %error,
                    "Provider call failed, retrying"
                );
                sleep(delay).await;

                // Another request may have cooled the provider down during the backoff
                if self.cooldowns.is_cooling_down(id, chain) {
                    tracing::warn!(
                        provider = id,
                        chain = chain,
                        address = address,
                        attempts = calls,
                        "Provider entered cooldown while retrying, falling back"
                    );
                    return Err((error, calls));
                }
                retry += 1;
                continue;
            }

            if class == FailureClass::Transient {
                self.cooldowns.start(id, chain);
            }
            tracing::warn!(
                provider = id,
                chain = chain,
                address = address,
                attempts = calls,
                error = %error,
                "Provider failed, falling back"
            );
            return Err((error, calls));
        }
    }
}
