//! Market snapshot orchestrator
//!
//! Single entry point that wires the SWR cache, the provider chain and
//! telemetry together.

use crate::{
    cache::{CacheLookup, CacheState, FetchOptions, SwrCache},
    config::SnapshotConfig,
    constants::{PROVIDER_FAILED_EVENT, PROVIDER_USED_EVENT},
    error::SnapshotError,
    health::{HealthTracker, ProviderHealth},
    provider::MarketSnapshotProvider,
    providers::{DexScreenerProvider, ProviderChain},
    retry::{CooldownEntry, CooldownRegistry, RetryPolicy},
    telemetry::{TelemetryMetadata, TelemetrySink, TelemetryState, TracingTelemetry},
    types::{
        AnnotatedSnapshot, ComponentHealth, HealthStatus, MarketSnapshot, ProviderStatus, TokenKey,
    },
};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::time::Instant;

/// Options for [`MarketSnapshotOrchestrator::get_token_snapshot`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOptions {
    /// Skip the cache and go to the providers
    pub force_refresh: bool,
}

impl SnapshotOptions {
    pub fn force_refresh() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

/// Market Snapshot Orchestrator
///
/// Owns the cache, health counters and cooldowns for one instance; separate
/// orchestrators never share state.
///
/// # Example
/// ```no_run
/// use market_snapshot_sdk::{MarketSnapshotOrchestrator, SnapshotConfig, SnapshotOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let orchestrator = MarketSnapshotOrchestrator::new(SnapshotConfig::default())?;
/// let snapshot = orchestrator
///     .get_token_snapshot(
///         "So11111111111111111111111111111111111111112",
///         "solana",
///         SnapshotOptions::default(),
///     )
///     .await?;
/// println!("{} via {}: ${:.4}", snapshot.snapshot.token.address, snapshot.provider, snapshot.price());
/// # Ok(())
/// # }
/// ```
pub struct MarketSnapshotOrchestrator {
    config: SnapshotConfig,
    cache: SwrCache<TokenKey, MarketSnapshot, SnapshotError>,
    chain: Arc<ProviderChain>,
    health: Arc<HealthTracker>,
    cooldowns: Arc<CooldownRegistry>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl MarketSnapshotOrchestrator {
    /// Creates an orchestrator backed by the built-in DexScreener provider
    pub fn new(config: SnapshotConfig) -> Result<Self, SnapshotError> {
        let dexscreener = DexScreenerProvider::new().map_err(|e| {
            SnapshotError::config(format!("failed to build DexScreener client: {e}"))
        })?;
        Self::with_providers(config, vec![Arc::new(dexscreener)])
    }

    /// Creates an orchestrator from `MARKET_SNAPSHOT_*` environment variables
    pub fn from_env() -> Result<Self, SnapshotError> {
        Self::new(SnapshotConfig::from_env()?)
    }

    /// Creates an orchestrator with custom providers
    ///
    /// Providers are ordered by `config.provider_priority`.
    pub fn with_providers(
        config: SnapshotConfig,
        providers: Vec<Arc<dyn MarketSnapshotProvider>>,
    ) -> Result<Self, SnapshotError> {
        config.validate()?;

        let health = Arc::new(HealthTracker::new());
        let cooldowns = Arc::new(CooldownRegistry::new(config.cooldown()));
        let chain = Arc::new(ProviderChain::new(
            providers,
            &config.provider_priority,
            Arc::clone(&health),
            Arc::clone(&cooldowns),
            RetryPolicy::from_config(&config),
            config.request_timeout(),
        ));
        let cache = SwrCache::new(config.ttl(), config.stale_while_revalidate());

        tracing::info!(
            providers = ?chain.provider_ids(),
            ttl_ms = config.ttl_ms,
            stale_while_revalidate_ms = config.stale_while_revalidate_ms,
            "Market snapshot orchestrator ready"
        );

        Ok(Self {
            config,
            cache,
            chain,
            health,
            cooldowns,
            telemetry: Arc::new(TracingTelemetry),
        })
    }

    /// Replaces the telemetry sink
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Gets the snapshot for a token on a chain
    ///
    /// Fresh cache entries are returned as is, stale ones are returned while a
    /// background refresh runs, and misses wait on the provider chain. Exactly
    /// one telemetry event is emitted per call.
    ///
    /// A failure means the data is temporarily unavailable; callers should keep
    /// showing whatever they rendered before.
    pub async fn get_token_snapshot(
        &self,
        address: &str,
        chain: &str,
        options: SnapshotOptions,
    ) -> Result<AnnotatedSnapshot, SnapshotError> {
        let started = Instant::now();
        let result = self.load(address, chain, options).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok((snapshot, state)) => {
                let state = if *state == CacheState::Fresh {
                    TelemetryState::Hit
                } else {
                    TelemetryState::Miss
                };
                self.emit(
                    PROVIDER_USED_EVENT,
                    latency_ms,
                    TelemetryMetadata {
                        provider_id: Some(snapshot.provider.clone()),
                        state,
                        latency_ms,
                        address: address.to_string(),
                        chain: chain.to_string(),
                        cached: snapshot.cached,
                        error: None,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(address = address, chain = chain, error = %e, "Snapshot unavailable");
                self.emit(
                    PROVIDER_FAILED_EVENT,
                    latency_ms,
                    TelemetryMetadata {
                        provider_id: e.last_provider().map(str::to_string),
                        state: TelemetryState::Miss,
                        latency_ms,
                        address: address.to_string(),
                        chain: chain.to_string(),
                        cached: false,
                        error: Some(e.to_string()),
                    },
                );
            }
        }

        result.map(|(snapshot, _)| snapshot)
    }

    async fn load(
        &self,
        address: &str,
        chain: &str,
        options: SnapshotOptions,
    ) -> Result<(AnnotatedSnapshot, CacheState), SnapshotError> {
        let key = Self::key(address, chain)?;

        let resolver = Arc::clone(&self.chain);
        let (token, network) = (key.address.clone(), key.chain.clone());
        let fetcher = move || async move {
            resolver
                .resolve(&token, &network)
                .await
                .map(|resolved| resolved.snapshot)
        };

        let fetched = self
            .cache
            .fetch(
                key,
                fetcher,
                FetchOptions {
                    force_refresh: options.force_refresh,
                },
            )
            .await?;

        let cached = fetched.from_cache();
        Ok((AnnotatedSnapshot::new(fetched.data, cached), fetched.state))
    }

    /// Normalizes the request into a cache key
    fn key(address: &str, chain: &str) -> Result<TokenKey, SnapshotError> {
        let address = address.trim();
        let chain = chain.trim().to_lowercase();
        if address.is_empty() {
            return Err(SnapshotError::invalid_request("token address is empty"));
        }
        if chain.is_empty() {
            return Err(SnapshotError::invalid_request("chain is empty"));
        }
        Ok(TokenKey::new(address, chain))
    }

    fn emit(&self, event_name: &str, latency_ms: u64, metadata: TelemetryMetadata) {
        let telemetry = &self.telemetry;
        let logged = catch_unwind(AssertUnwindSafe(|| {
            telemetry.log(event_name, latency_ms as f64, &metadata)
        }));
        if logged.is_err() {
            tracing::warn!(event = event_name, "Telemetry sink panicked, event dropped");
        }
    }

    /// Reads the cache for a token without fetching
    pub fn peek(&self, address: &str, chain: &str) -> CacheLookup<MarketSnapshot> {
        match Self::key(address, chain) {
            Ok(key) => self.cache.get(&key),
            Err(_) => CacheLookup {
                state: CacheState::Miss,
                entry: None,
            },
        }
    }

    /// Drops the cached snapshot for a token
    pub fn invalidate(&self, address: &str, chain: &str) {
        if let Ok(key) = Self::key(address, chain) {
            self.cache.invalidate(&key);
        }
    }

    /// Clears cache, health counters and cooldowns
    pub fn reset_state(&self) {
        self.cache.clear();
        self.health.reset();
        self.cooldowns.clear_all();
        tracing::info!("Market snapshot state reset");
    }

    /// Health records for every configured provider, in priority order
    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.chain
            .provider_ids()
            .iter()
            .map(|id| self.health.get_health(id))
            .collect()
    }

    /// Currently active provider cooldowns
    pub fn active_cooldowns(&self) -> Vec<CooldownEntry> {
        self.cooldowns.active()
    }

    /// Perform a health check on the orchestrator
    ///
    /// # Returns
    /// ComponentHealth indicating the status of the providers and cache
    pub fn health_check(&self) -> ComponentHealth {
        let mut details = HashMap::new();

        let providers = self.provider_health();
        let cooldowns = self.active_cooldowns();

        details.insert(
            "cached_entries".to_string(),
            serde_json::json!(self.cache.len()),
        );
        details.insert(
            "in_flight_fetches".to_string(),
            serde_json::json!(self.cache.in_flight_count()),
        );
        details.insert("providers".to_string(), serde_json::json!(providers));
        details.insert("cooldowns".to_string(), serde_json::json!(cooldowns));

        let unavailable: Vec<&str> = providers
            .iter()
            .filter(|p| p.status() == ProviderStatus::Unavailable)
            .map(|p| p.provider_id.as_str())
            .collect();

        let status = if providers.is_empty() || unavailable.len() == providers.len() {
            HealthStatus::Unhealthy
        } else if !unavailable.is_empty() || !cooldowns.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "All snapshot providers are operational".to_string(),
            HealthStatus::Degraded => format!(
                "{} provider(s) unavailable, {} cooldown(s) active",
                unavailable.len(),
                cooldowns.len()
            ),
            HealthStatus::Unhealthy => "No snapshot provider is available".to_string(),
        };

        ComponentHealth {
            name: "market_snapshot_orchestrator".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }
}
