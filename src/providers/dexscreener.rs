//! DexScreener snapshot provider implementation

use crate::{
    constants::{
        DEXSCREENER_API_URL, DEXSCREENER_FULL_CONFIDENCE_LIQUIDITY_USD,
        DEXSCREENER_TOKENS_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_MS, USER_AGENT,
    },
    error::ProviderError,
    provider::{MarketSnapshotProvider, ProviderRequest},
    types::{MarketSnapshot, TokenInfo},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// DexScreener API response for token pair lookups
#[derive(Debug, Deserialize)]
struct TokensResponse {
    pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DexPair {
    chain_id: String,
    base_token: DexToken,
    price_usd: Option<String>,
    volume: Option<DexVolume>,
    liquidity: Option<DexLiquidity>,
}

#[derive(Debug, Deserialize)]
struct DexToken {
    address: String,
    name: Option<String>,
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DexVolume {
    h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DexLiquidity {
    usd: Option<f64>,
}

/// DexScreener snapshot provider
///
/// Picks the deepest-liquidity pair in which the token is the base asset.
pub struct DexScreenerProvider {
    client: Client,
    base_url: String,
}

impl DexScreenerProvider {
    /// Creates a new DexScreener provider
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEXSCREENER_API_URL)
    }

    /// Creates a provider against a different host (proxies, test servers)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Builds the DexScreener API URL for a token
    fn build_url(&self, address: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            DEXSCREENER_TOKENS_ENDPOINT,
            address
        )
    }

    /// Normalizes the DexScreener response into a snapshot
    fn parse_response(
        &self,
        response: TokensResponse,
        address: &str,
        chain: &str,
    ) -> Result<MarketSnapshot, ProviderError> {
        let best = response
            .pairs
            .unwrap_or_default()
            .into_iter()
            .filter(|pair| {
                pair.chain_id.eq_ignore_ascii_case(chain)
                    && same_address(&pair.base_token.address, address)
            })
            .filter_map(|pair| {
                let price = pair.price_usd.as_deref()?.parse::<f64>().ok()?;
                let liquidity = pair.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
                Some((pair, price, liquidity))
            })
            .max_by(|(_, _, a), (_, _, b)| a.total_cmp(b));

        let Some((pair, price, liquidity)) = best else {
            return Err(ProviderError::UnsupportedToken(format!("{chain}:{address}")));
        };

        let volume = pair.volume.and_then(|v| v.h24).unwrap_or(0.0);
        let confidence = (liquidity / DEXSCREENER_FULL_CONFIDENCE_LIQUIDITY_USD).min(1.0);
        let token = TokenInfo {
            address: address.to_string(),
            chain: chain.to_string(),
            symbol: pair.base_token.symbol,
            name: pair.base_token.name,
        };

        Ok(MarketSnapshot::new(
            token,
            price,
            volume,
            liquidity,
            self.provider_id(),
            confidence,
        ))
    }
}

#[async_trait]
impl MarketSnapshotProvider for DexScreenerProvider {
    async fn fetch_snapshot(
        &self,
        address: &str,
        chain: &str,
        request: ProviderRequest,
    ) -> Result<MarketSnapshot, ProviderError> {
        let url = self.build_url(address);
        tracing::debug!(url = %url, chain = chain, "Fetching snapshot from DexScreener");

        let response = self
            .client
            .get(&url)
            .timeout(request.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let response_text = response.text().await?;

        let parsed: TokensResponse = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse DexScreener response: {}",
                e
            ))
        })?;

        self.parse_response(parsed, address, chain)
    }

    fn provider_id(&self) -> &str {
        "dexscreener"
    }
}

/// Hex (`0x`) addresses are case-insensitive; base58 mints are not
fn same_address(a: &str, b: &str) -> bool {
    let is_hex = |s: &str| s.starts_with("0x") || s.starts_with("0X");
    if is_hex(a) && is_hex(b) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}
