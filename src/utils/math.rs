//! Mathematical utility functions
//!
//! Base units are integers (`U256`); human amounts travel as decimal strings or
//! `Decimal`. Conversions between the two are done on the digit string so no
//! precision is lost to floating point.

use alloy::primitives::U256;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Serialize, Serializer};
use std::fmt;
use crate::errors::{SwapError, SwapErrorType, SwapResult};

/// Scale at which venue rates are reported.
pub const RATE_DECIMAL_PLACES: u32 = 20;

pub fn pow10_u256(precision: u32) -> U256 {
    U256::from(10u64).pow(U256::from(precision))
}

/// Human amount (`"1.5"`) to base units. Extra fractional digits are truncated.
pub fn to_base_unit(amount: &str, precision: u32) -> SwapResult<U256> {
    let amount = amount.trim();
    let invalid = || {
        SwapError::new(SwapErrorType::ValidationFailed, "invalid amount")
            .with_details(serde_json::json!({ "amount": amount, "precision": precision }))
    };

    if amount.is_empty() || amount.starts_with('-') {
        return Err(invalid());
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) || (whole.is_empty() && fraction.is_empty()) {
        return Err(invalid());
    }

    let precision_len = precision as usize;
    let mut digits = String::with_capacity(whole.len() + precision_len);
    digits.push_str(whole);
    if fraction.len() >= precision_len {
        digits.push_str(&fraction[..precision_len]);
    } else {
        digits.push_str(fraction);
        digits.extend(std::iter::repeat_n('0', precision_len - fraction.len()));
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| invalid())
}

pub fn decimal_to_base_unit(amount: Decimal, precision: u32) -> SwapResult<U256> {
    to_base_unit(&amount.normalize().to_string(), precision)
}

/// Base units to a human amount string with trailing zeros removed.
pub fn from_base_unit(amount: U256, precision: u32) -> String {
    let digits = amount.to_string();
    let precision = precision as usize;
    if precision == 0 {
        return digits;
    }

    let padded = if digits.len() <= precision {
        format!("{}{}", "0".repeat(precision - digits.len() + 1), digits)
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - precision);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Base units as a `Decimal`; rounds beyond 28 significant digits.
pub fn base_unit_to_decimal(amount: U256, precision: u32) -> SwapResult<Decimal> {
    let human = from_base_unit(amount, precision);
    Decimal::from_str(&human).map_err(|e| {
        SwapError::new(SwapErrorType::ValidationFailed, "amount exceeds decimal range")
            .with_details(serde_json::json!({ "amount": human }))
            .with_cause(e)
    })
}

/// Buy amount per unit of sell amount, both given in base units.
pub fn rate_from_base_units(
    buy_amount: U256,
    buy_precision: u32,
    sell_amount: U256,
    sell_precision: u32,
) -> SwapResult<Decimal> {
    let buy = base_unit_to_decimal(buy_amount, buy_precision)?;
    let sell = base_unit_to_decimal(sell_amount, sell_precision)?;
    buy.checked_div(sell)
        .map(round_rate)
        .ok_or_else(|| SwapError::new(SwapErrorType::ValidationFailed, "cannot derive rate from a zero sell amount"))
}

pub fn round_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(RATE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

pub fn bps_to_decimal(bps: u32) -> Decimal {
    Decimal::from(bps) / dec!(10000)
}

/// Non-negative fixed-point value `mantissa / 10^scale` with no digit limit.
///
/// Base-unit amounts multiplied by venue rates easily exceed the 28
/// significant digits a `Decimal` holds, so USD fee figures are kept here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExactDecimal {
    mantissa: U256,
    scale: u32,
}

impl ExactDecimal {
    pub const ZERO: Self = Self {
        mantissa: U256::ZERO,
        scale: 0,
    };

    /// Trailing zeros are stripped, so equal values compare equal.
    pub fn new(mantissa: U256, scale: u32) -> Self {
        let ten = U256::from(10u64);
        let mut value = Self { mantissa, scale };
        if value.mantissa.is_zero() {
            return Self::ZERO;
        }
        while value.scale > 0 && (value.mantissa % ten).is_zero() {
            value.mantissa /= ten;
            value.scale -= 1;
        }
        value
    }

    pub fn from_decimal(value: Decimal) -> SwapResult<Self> {
        if value < Decimal::ZERO {
            return Err(SwapError::new(SwapErrorType::ValidationFailed, "exact amounts cannot be negative")
                .with_details(serde_json::json!({ "value": value.to_string() })));
        }
        Ok(Self::new(U256::from(value.mantissa().unsigned_abs()), value.scale()))
    }

    /// `amount / 10^precision * rate` without rounding.
    pub fn from_base_units_times(amount: U256, precision: u32, rate: Decimal) -> SwapResult<Self> {
        let rate = Self::from_decimal(rate)?;
        let mantissa = amount.checked_mul(rate.mantissa).ok_or_else(|| {
            SwapError::new(SwapErrorType::ValidationFailed, "amount times rate overflows")
                .with_details(serde_json::json!({ "amount": amount.to_string(), "rate": rate.to_string() }))
        })?;
        Ok(Self::new(mantissa, precision + rate.scale))
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// Nearest `Decimal`, for ranking and display arithmetic.
    pub fn to_decimal(&self) -> SwapResult<Decimal> {
        base_unit_to_decimal(self.mantissa, self.scale)
    }
}

impl fmt::Display for ExactDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&from_base_unit(self.mantissa, self.scale))
    }
}

impl Serialize for ExactDecimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn converts_human_amount_to_base_units() {
        assert_eq!(to_base_unit("1", 18).unwrap(), U256::from(10u64).pow(U256::from(18)));
        assert_eq!(to_base_unit("0.000001", 6).unwrap(), U256::from(1));
        assert_eq!(to_base_unit("12.3456789", 6).unwrap(), U256::from(12_345_678u64));
        assert_eq!(to_base_unit(".5", 2).unwrap(), U256::from(50));
        assert_eq!(to_base_unit("0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(to_base_unit("-1", 18).unwrap_err().is(SwapErrorType::ValidationFailed));
        assert!(to_base_unit("1e18", 18).is_err());
        assert!(to_base_unit("", 18).is_err());
        assert!(to_base_unit(".", 18).is_err());
    }

    #[test]
    fn formats_base_units() {
        assert_eq!(from_base_unit(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(from_base_unit(U256::from(1u64), 8), "0.00000001");
        assert_eq!(from_base_unit(U256::ZERO, 18), "0");
        assert_eq!(from_base_unit(U256::from(42u64), 0), "42");
        assert_eq!(
            from_base_unit(U256::from(985442057341242012u64), 18),
            "0.985442057341242012"
        );
    }

    #[test]
    fn rate_uses_human_amounts() {
        let rate = rate_from_base_units(
            U256::from(200_000_000u64),
            6,
            U256::from(10u64).pow(U256::from(17)),
            18,
        )
        .unwrap();
        assert_eq!(rate, dec!(2000));
        assert!(rate_from_base_units(U256::from(1), 6, U256::ZERO, 18).is_err());
    }

    #[test]
    fn bps() {
        assert_eq!(bps_to_decimal(300), dec!(0.03));
    }

    #[test]
    fn exact_product_keeps_every_digit() {
        let fee = ExactDecimal::from_base_units_times(
            U256::from(14_557_942_658_757_988u64),
            18,
            dec!(1233.65940923824103061992),
        )
        .unwrap();
        assert_eq!(fee.to_string(), "17.95954294012756741283729339486489192096");
        assert_eq!(fee.to_decimal().unwrap().round_dp(2), dec!(17.96));
    }

    #[test]
    fn exact_values_are_normalized() {
        assert_eq!(ExactDecimal::new(U256::from(1_500u64), 3), ExactDecimal::from_decimal(dec!(1.5)).unwrap());
        assert_eq!(ExactDecimal::new(U256::ZERO, 12), ExactDecimal::ZERO);
        assert_eq!(ExactDecimal::ZERO.to_string(), "0");
        assert!(ExactDecimal::from_decimal(dec!(-0.1)).unwrap_err().is(SwapErrorType::ValidationFailed));
        assert_eq!(
            serde_json::to_value(ExactDecimal::from_decimal(dec!(0.0873)).unwrap()).unwrap(),
            serde_json::json!("0.0873")
        );
    }

    proptest! {
        #[test]
        fn base_unit_round_trip(amount in any::<u128>(), precision in 0u32..=30) {
            let base = U256::from(amount);
            let human = from_base_unit(base, precision);
            prop_assert_eq!(to_base_unit(&human, precision).unwrap(), base);
        }
    }
}
