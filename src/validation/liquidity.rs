//! Pool depth validation

use alloy::primitives::U256;
use crate::errors::{SwapError, SwapErrorType, SwapResult};

/// A pool with an empty side cannot price or fill a swap.
pub fn validate_pool_depth(balance_asset: U256, balance_rune: U256, pool: &str) -> SwapResult<()> {
    if balance_asset.is_zero() || balance_rune.is_zero() {
        return Err(SwapError::new(
            SwapErrorType::PoolNotFound,
            format!("pool {} has no liquidity", pool),
        )
        .with_details(serde_json::json!({ "pool": pool })));
    }
    Ok(())
}
