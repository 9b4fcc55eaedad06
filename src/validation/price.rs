//! USD rate validation

use rust_decimal::prelude::*;
use tracing::warn;
use crate::errors::{SwapError, SwapErrorType, SwapResult};
use crate::types::Asset;

pub fn validate_usd_rate(rate: Decimal, asset: &Asset, source: &str) -> SwapResult<Decimal> {
    if rate <= Decimal::ZERO {
        warn!("⚠️ {} returned a non-positive USD rate for {}: {}", source, asset.symbol, rate);
        return Err(SwapError::new(
            SwapErrorType::ResponseError,
            format!("[{}] failed to get USD rate for {}", source, asset.symbol),
        )
        .with_details(serde_json::json!({ "assetId": asset.asset_id.as_str(), "rate": rate.to_string() })));
    }
    Ok(rate)
}
