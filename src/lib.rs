//! # Market Snapshot SDK
//!
//! Keeps token price / volume / liquidity snapshots available while the
//! third-party market-data providers behind them are flaky.
//!
//! Three mechanisms work together:
//!
//! - a stale-while-revalidate cache that deduplicates concurrent fetches per token
//! - health-ranked provider fallback
//! - retry with exponential backoff and a per-provider, per-chain cooldown
//!
//! ## Usage
//!
//! ```no_run
//! use market_snapshot_sdk::{MarketSnapshotOrchestrator, SnapshotConfig, SnapshotOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = MarketSnapshotOrchestrator::new(SnapshotConfig::from_env()?)?;
//!
//! let bonk = orchestrator
//!     .get_token_snapshot(
//!         "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
//!         "solana",
//!         SnapshotOptions::default(),
//!     )
//!     .await?;
//! println!("BONK: ${:.8} (via {}, cached: {})", bonk.price(), bonk.provider, bonk.cached);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! get_token_snapshot(address, chain)
//!     ↓
//! SwrCache (fresh → return, stale → return + background refresh, miss → wait)
//!     ↓
//! ProviderChain (rank by health, skip cooldowns, retry with backoff)
//!     ↓
//! MarketSnapshotProvider (DexScreener, your own adapters)
//! ```
//!
//! ## Adding New Providers
//!
//! 1. Implement the `MarketSnapshotProvider` trait, normalizing the upstream payload
//!    into a `MarketSnapshot` and returning `ProviderError` on any failure
//! 2. Pass it to `MarketSnapshotOrchestrator::with_providers`
//! 3. Add its id to `provider_priority` if it should be preferred

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheState, FetchPanicked, SwrCache};
pub use config::SnapshotConfig;
pub use error::{ProviderError, SnapshotError};
pub use health::{HealthTracker, ProviderHealth};
pub use orchestrator::{MarketSnapshotOrchestrator, SnapshotOptions};
pub use provider::{MarketSnapshotProvider, ProviderRequest};
pub use telemetry::{MemoryTelemetry, TelemetrySink, TracingTelemetry};
pub use types::{
    AnnotatedSnapshot, ComponentHealth, HealthStatus, MarketSnapshot, ProviderStatus, TokenInfo,
};
