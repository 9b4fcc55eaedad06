//! Loose validation of venue response fields
//!
//! Venues return amounts as strings. Anything that is not a plain
//! non-negative number is a `ResponseError`.

use alloy::primitives::U256;
use rust_decimal::prelude::*;
use crate::errors::{SwapError, SwapErrorType, SwapResult};

pub fn parse_base_units(value: &str, field: &str) -> SwapResult<U256> {
    let trimmed = value.trim();
    // some venues render integers with a trailing ".0"
    let integer = trimmed.split_once('.').map(|(w, f)| if f.chars().all(|c| c == '0') { w } else { trimmed }).unwrap_or(trimmed);
    if integer.is_empty() || !integer.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(value, field));
    }
    U256::from_str_radix(integer, 10).map_err(|_| invalid(value, field))
}

pub fn parse_decimal(value: &str, field: &str) -> SwapResult<Decimal> {
    let parsed = Decimal::from_str(value.trim())
        .or_else(|_| Decimal::from_scientific(value.trim()))
        .map_err(|_| invalid(value, field))?;
    if parsed.is_sign_negative() {
        return Err(invalid(value, field));
    }
    Ok(parsed)
}

/// JSON-RPC style quantity: `0x`-prefixed hex, or a plain decimal integer.
pub fn parse_quantity(value: &str, field: &str) -> SwapResult<U256> {
    let trimmed = value.trim();
    match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some("") => Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|_| invalid(value, field)),
        None => parse_base_units(trimmed, field),
    }
}

fn invalid(value: &str, field: &str) -> SwapError {
    SwapError::new(SwapErrorType::ResponseError, format!("invalid {} in venue response", field))
        .with_details(serde_json::json!({ "field": field, "value": value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_amount_strings() {
        assert_eq!(parse_base_units("14501811818247595090576", "buyAmount").unwrap().to_string(), "14501811818247595090576");
        assert_eq!(parse_base_units("100.0", "gas").unwrap(), U256::from(100));
        assert!(parse_base_units("1.5", "gas").is_err());
        assert!(parse_base_units("-3", "gas").is_err());
        assert!(parse_base_units("", "gas").is_err());
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_quantity("0x30d40", "gasLimit").unwrap(), U256::from(200_000));
        assert_eq!(parse_quantity("0x", "value").unwrap(), U256::ZERO);
        assert_eq!(parse_quantity("1236", "gasPrice").unwrap(), U256::from(1236));
        assert!(parse_quantity("0xzz", "gasPrice").is_err());
    }

    #[test]
    fn parses_decimals() {
        assert_eq!(parse_decimal("0.002000000000000000", "swap_fee").unwrap(), dec!(0.002));
        assert!(parse_decimal("-1", "price").is_err());
        assert!(parse_decimal("abc", "price").unwrap_err().is(SwapErrorType::ResponseError));
    }
}
