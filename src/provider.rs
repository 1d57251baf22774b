//! Provider abstraction for fetching market snapshots from external APIs

use crate::{error::ProviderError, types::MarketSnapshot};
use async_trait::async_trait;
use std::time::Duration;

/// Per-call options handed to a provider adapter
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest {
    /// Deadline the caller will enforce; adapters may use it for their HTTP client
    pub timeout: Duration,
}

/// Trait for market snapshot providers
///
/// Implementations normalize whatever their upstream API returns into a
/// [`MarketSnapshot`]. On any failure they must return an error, never an
/// empty or zero-valued snapshot. Errors should carry the HTTP status when one
/// is available (see [`ProviderError::from_status`]).
#[async_trait]
pub trait MarketSnapshotProvider: Send + Sync {
    /// Fetches the current snapshot for a token on a chain
    ///
    /// # Arguments
    /// * `address` - Token contract / mint address
    /// * `chain` - Chain identifier (e.g. `solana`, `ethereum`)
    /// * `request` - Per-call options
    async fn fetch_snapshot(
        &self,
        address: &str,
        chain: &str,
        request: ProviderRequest,
    ) -> Result<MarketSnapshot, ProviderError>;

    /// Returns the id of this provider, used for ranking, cooldowns and telemetry
    fn provider_id(&self) -> &str;
}
