//! Provider chain and provider implementations

pub mod chain;
pub mod dexscreener;

pub use chain::{ProviderChain, ResolvedSnapshot};
pub use dexscreener::DexScreenerProvider;
