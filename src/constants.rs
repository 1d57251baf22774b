//! Constants for the Market Snapshot SDK
//!
//! Every tunable in [`SnapshotConfig`](crate::config::SnapshotConfig) falls back
//! to one of these defaults when it is not provided.

/// How long a cached snapshot is served as fresh (in milliseconds)
pub const DEFAULT_TTL_MS: u64 = 15_000;

/// How long past the TTL a snapshot may still be served while it is refreshed
/// in the background (in milliseconds). Zero disables stale serving.
pub const DEFAULT_STALE_WHILE_REVALIDATE_MS: u64 = 45_000;

/// Maximum number of retries for a single provider within one request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between retries (in milliseconds)
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 200;

/// Upper bound for a single backoff delay (in milliseconds)
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

/// How long a provider is skipped for a network after exhausting retries (in milliseconds)
pub const DEFAULT_COOLDOWN_MS: u64 = 30_000;

/// Timeout applied to every provider attempt (in milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Provider order used when no priority is configured
pub const DEFAULT_PROVIDER_PRIORITY: &[&str] = &["dexscreener"];

/// Failure rate assigned to providers with no observations when ranking.
///
/// Sits between a proven-good provider (0.0) and a consistently failing one (1.0).
pub const NEUTRAL_FAILURE_RATE: f64 = 0.5;

/// Failure rate at or above which a provider is reported as degraded
pub const DEGRADED_FAILURE_RATE: f64 = 0.25;

/// Failure rate at or above which a provider is reported as unavailable
pub const UNAVAILABLE_FAILURE_RATE: f64 = 0.75;

/// Telemetry event emitted for every successful snapshot request
pub const PROVIDER_USED_EVENT: &str = "market.provider.used";

/// Telemetry event emitted for every failed snapshot request
pub const PROVIDER_FAILED_EVENT: &str = "market.provider.failed";

/// DexScreener API base URL
pub const DEXSCREENER_API_URL: &str = "https://api.dexscreener.com";

/// DexScreener endpoint returning all pairs for a token address
pub const DEXSCREENER_TOKENS_ENDPOINT: &str = "/latest/dex/tokens";

/// Liquidity (USD) at which a DexScreener quote is given full confidence
pub const DEXSCREENER_FULL_CONFIDENCE_LIQUIDITY_USD: f64 = 250_000.0;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "market-snapshot-sdk/0.1.0";
