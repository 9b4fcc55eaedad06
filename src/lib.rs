//! Swapper core - one interface over heterogeneous swap venues
//!
//! Normalizes quote, build and execute flows across AMM aggregators (0x),
//! intent relays (CoW Swap), native-chain pools (THORChain) and IBC venues
//! (Osmosis). Handles ERC20 allowance logic and the fixed-point fee and rate
//! arithmetic around them.

pub mod config;
pub mod errors;
pub mod types;
pub mod utils;
pub mod network;
pub mod chain;
pub mod allowance;
pub mod validation;
pub mod swapper;
pub mod swappers;
pub mod manager;
pub mod rates;

#[cfg(test)]
mod test_utils;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{SwapError, SwapErrorType, SwapResult};
pub use manager::{SwapperManager, SwapperManagerCache};
pub use swapper::Swapper;
pub use types::*;

// Type alias for our concrete provider
pub type ConcreteProvider = alloy::providers::RootProvider<alloy::transports::BoxTransport>;
