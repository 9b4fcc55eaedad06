//! Trade amount and fee composition for display
//!
//! Everything is derived from one `TradeAmountState`: the amount the user
//! typed, which field they typed it in, the two assets' fiat rates and the
//! active quote's fees. Fiat rates are in the user's selected currency; venue
//! fees are in USD and go through `selected_currency_to_usd_rate` first. A
//! zero fiat rate means the rate is unknown and figures depending on it are 0.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::Serialize;
use crate::{
    errors::SwapResult,
    types::{Asset, TradeQuote},
    utils::{base_unit_to_decimal, decimal_to_base_unit},
};

/// Which input the amount was entered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeAmountInputField {
    SellCrypto,
    SellFiat,
    BuyCrypto,
    BuyFiat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeAmountState {
    pub action: TradeAmountInputField,
    /// Crypto or fiat, depending on `action`.
    pub amount: Decimal,
    pub sell_asset: Asset,
    pub buy_asset: Asset,
    pub sell_asset_fiat_rate: Decimal,
    pub buy_asset_fiat_rate: Decimal,
    pub selected_currency_to_usd_rate: Decimal,
    pub sell_asset_trade_fee_usd: Decimal,
    pub buy_asset_trade_fee_usd: Decimal,
    pub quote: Option<TradeQuote>,
    pub slippage: Decimal,
}

/// Figures shown in the four trade inputs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TradeAmounts {
    pub sell_amount_sell_asset_crypto_precision: Decimal,
    pub buy_amount_buy_asset_crypto_precision: Decimal,
    pub fiat_sell_amount: Decimal,
    pub fiat_buy_amount: Decimal,
}

/// Negative results saturate to zero base units.
fn to_base(amount: Decimal, precision: u32) -> SwapResult<U256> {
    decimal_to_base_unit(amount.max(Decimal::ZERO), precision)
}

fn div_or_zero(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

impl TradeAmountState {
    fn sell_human(&self, amount: U256) -> SwapResult<Decimal> {
        base_unit_to_decimal(amount, self.sell_asset.precision)
    }

    fn buy_human(&self, amount: U256) -> SwapResult<Decimal> {
        base_unit_to_decimal(amount, self.buy_asset.precision)
    }

    /// Sell asset units per buy asset unit.
    pub fn asset_price_ratio(&self) -> Decimal {
        div_or_zero(self.buy_asset_fiat_rate, self.sell_asset_fiat_rate)
    }

    pub fn sell_amount_before_fees_base_unit(&self) -> SwapResult<U256> {
        if self.sell_asset_fiat_rate.is_zero() {
            return Ok(U256::ZERO);
        }
        let amount = match self.action {
            TradeAmountInputField::BuyCrypto => self.amount * self.asset_price_ratio(),
            TradeAmountInputField::SellCrypto => self.amount,
            TradeAmountInputField::BuyFiat | TradeAmountInputField::SellFiat => {
                div_or_zero(self.amount, self.sell_asset_fiat_rate)
            }
        };
        to_base(amount, self.sell_asset.precision)
    }

    pub fn buy_amount_before_fees_base_unit(&self) -> SwapResult<U256> {
        if self.buy_asset_fiat_rate.is_zero() {
            return Ok(U256::ZERO);
        }
        let amount = match self.action {
            TradeAmountInputField::BuyCrypto => self.amount,
            TradeAmountInputField::SellCrypto => div_or_zero(self.amount, self.asset_price_ratio()),
            TradeAmountInputField::BuyFiat | TradeAmountInputField::SellFiat => {
                div_or_zero(self.amount, self.buy_asset_fiat_rate)
            }
        };
        to_base(amount, self.buy_asset.precision)
    }

    /// The sell amount expressed in buy asset base units at fiat prices.
    pub fn sell_amount_before_fees_buy_asset_base_unit(&self) -> SwapResult<U256> {
        let sell = self.sell_human(self.sell_amount_before_fees_base_unit()?)?;
        to_base(div_or_zero(sell, self.asset_price_ratio()), self.buy_asset.precision)
    }

    pub fn sell_asset_trade_fee_sell_asset_base_unit(&self) -> SwapResult<U256> {
        let fee_fiat = self.sell_asset_trade_fee_usd * self.selected_currency_to_usd_rate;
        to_base(div_or_zero(fee_fiat, self.sell_asset_fiat_rate), self.sell_asset.precision)
    }

    pub fn buy_asset_trade_fee_buy_asset_base_unit(&self) -> SwapResult<U256> {
        let fee_fiat = self.buy_asset_trade_fee_usd * self.selected_currency_to_usd_rate;
        to_base(div_or_zero(fee_fiat, self.buy_asset_fiat_rate), self.buy_asset.precision)
    }

    pub fn sell_asset_trade_fee_buy_asset_base_unit(&self) -> SwapResult<U256> {
        let fee = self.sell_human(self.sell_asset_trade_fee_sell_asset_base_unit()?)?;
        to_base(div_or_zero(fee, self.asset_price_ratio()), self.buy_asset.precision)
    }

    pub fn buy_asset_trade_fee_sell_asset_base_unit(&self) -> SwapResult<U256> {
        let fee = self.buy_human(self.buy_asset_trade_fee_buy_asset_base_unit()?)?;
        to_base(fee * self.asset_price_ratio(), self.sell_asset.precision)
    }

    pub fn total_trade_fee_sell_asset_base_unit(&self) -> SwapResult<U256> {
        Ok(self.sell_asset_trade_fee_sell_asset_base_unit()? + self.buy_asset_trade_fee_sell_asset_base_unit()?)
    }

    pub fn total_trade_fee_buy_asset_base_unit(&self) -> SwapResult<U256> {
        Ok(self.sell_asset_trade_fee_buy_asset_base_unit()? + self.buy_asset_trade_fee_buy_asset_base_unit()?)
    }

    pub fn sell_amount_plus_fees_base_unit(&self) -> SwapResult<U256> {
        Ok(self.sell_amount_before_fees_base_unit()? + self.total_trade_fee_sell_asset_base_unit()?)
    }

    pub fn buy_amount_after_fees_base_unit(&self) -> SwapResult<U256> {
        Ok(self
            .sell_amount_before_fees_buy_asset_base_unit()?
            .saturating_sub(self.total_trade_fee_buy_asset_base_unit()?))
    }

    pub fn sell_amount_before_fees_fiat(&self) -> SwapResult<Decimal> {
        Ok(self.sell_human(self.sell_amount_before_fees_base_unit()?)? * self.sell_asset_fiat_rate)
    }

    pub fn buy_amount_before_fees_fiat(&self) -> SwapResult<Decimal> {
        Ok(self.buy_human(self.buy_amount_before_fees_base_unit()?)? * self.buy_asset_fiat_rate)
    }

    pub fn sell_amount_plus_fees_fiat(&self) -> SwapResult<Decimal> {
        Ok(self.sell_human(self.sell_amount_plus_fees_base_unit()?)? * self.sell_asset_fiat_rate)
    }

    pub fn buy_amount_after_fees_fiat(&self) -> SwapResult<Decimal> {
        Ok(self.buy_human(self.buy_amount_after_fees_base_unit()?)? * self.buy_asset_fiat_rate)
    }

    /// The quote's sell amount plus the sell side trade fee. `None` without a quote.
    pub fn quote_sell_amount_plus_fees_base_unit(&self) -> SwapResult<Option<U256>> {
        let Some(quote) = &self.quote else {
            return Ok(None);
        };
        Ok(Some(
            quote.sell_amount_before_fees_crypto_base_unit + self.sell_asset_trade_fee_sell_asset_base_unit()?,
        ))
    }

    pub fn quote_sell_amount_plus_fees_fiat(&self) -> SwapResult<Option<Decimal>> {
        self.quote_sell_amount_plus_fees_base_unit()?
            .map(|amount| Ok(self.sell_human(amount)? * self.sell_asset_fiat_rate))
            .transpose()
    }

    /// The quote's buy amount less both trade fees in buy terms.
    pub fn quote_buy_amount_after_fees_base_unit(&self) -> SwapResult<Option<U256>> {
        let Some(quote) = &self.quote else {
            return Ok(None);
        };
        Ok(Some(
            quote
                .buy_amount_crypto_base_unit
                .saturating_sub(self.buy_asset_trade_fee_buy_asset_base_unit()?)
                .saturating_sub(self.sell_asset_trade_fee_buy_asset_base_unit()?),
        ))
    }

    pub fn quote_buy_amount_after_fees_fiat(&self) -> SwapResult<Option<Decimal>> {
        self.quote_buy_amount_after_fees_base_unit()?
            .map(|amount| Ok(self.buy_human(amount)? * self.buy_asset_fiat_rate))
            .transpose()
    }

    /// Amounts for the field being edited. The opposite side stays 0 until a
    /// quote arrives.
    pub fn trade_amounts_by_action(&self) -> SwapResult<TradeAmounts> {
        let amounts = match self.action {
            TradeAmountInputField::SellCrypto => TradeAmounts {
                sell_amount_sell_asset_crypto_precision: self.amount,
                fiat_sell_amount: self.sell_amount_before_fees_fiat()?,
                ..Default::default()
            },
            TradeAmountInputField::SellFiat => TradeAmounts {
                sell_amount_sell_asset_crypto_precision: self.sell_human(self.sell_amount_before_fees_base_unit()?)?,
                fiat_sell_amount: self.amount,
                ..Default::default()
            },
            TradeAmountInputField::BuyCrypto => TradeAmounts {
                buy_amount_buy_asset_crypto_precision: self.amount,
                fiat_buy_amount: self.buy_amount_before_fees_fiat()?,
                ..Default::default()
            },
            TradeAmountInputField::BuyFiat => TradeAmounts {
                buy_amount_buy_asset_crypto_precision: self.buy_human(self.buy_amount_before_fees_base_unit()?)?,
                fiat_buy_amount: self.amount,
                ..Default::default()
            },
        };
        Ok(amounts)
    }

    /// Amounts once a quote is in: the buy side carries fees and slippage.
    pub fn trade_amounts_from_quote(&self) -> SwapResult<TradeAmounts> {
        if self.amount <= Decimal::ZERO {
            return Ok(TradeAmounts::default());
        }
        let quote_buy_after_fees = match self.quote_buy_amount_after_fees_base_unit()? {
            Some(amount) => self.buy_human(amount)?,
            None => Decimal::ZERO,
        };
        let quote_buy_after_fees_and_slippage = slippage_adjusted(quote_buy_after_fees, self.slippage);
        let quote_buy_after_fees_fiat = self.quote_buy_amount_after_fees_fiat()?.unwrap_or_default();
        let quote_sell_plus_fees = self.sell_human(self.quote_sell_amount_plus_fees_base_unit()?.unwrap_or_default())?;
        let quote_sell_plus_fees_fiat = self.quote_sell_amount_plus_fees_fiat()?.unwrap_or_default();

        let amounts = match self.action {
            TradeAmountInputField::SellCrypto => TradeAmounts {
                sell_amount_sell_asset_crypto_precision: self.amount,
                buy_amount_buy_asset_crypto_precision: quote_buy_after_fees_and_slippage,
                fiat_sell_amount: self.sell_amount_before_fees_fiat()?,
                fiat_buy_amount: quote_buy_after_fees_fiat,
            },
            TradeAmountInputField::SellFiat => TradeAmounts {
                sell_amount_sell_asset_crypto_precision: self.sell_human(self.sell_amount_before_fees_base_unit()?)?,
                buy_amount_buy_asset_crypto_precision: quote_buy_after_fees_and_slippage,
                fiat_sell_amount: self.amount,
                fiat_buy_amount: quote_buy_after_fees_fiat,
            },
            TradeAmountInputField::BuyCrypto => TradeAmounts {
                sell_amount_sell_asset_crypto_precision: quote_sell_plus_fees,
                buy_amount_buy_asset_crypto_precision: self.buy_human(self.buy_amount_after_fees_base_unit()?)?,
                fiat_sell_amount: quote_sell_plus_fees_fiat,
                fiat_buy_amount: self.buy_amount_before_fees_fiat()?,
            },
            TradeAmountInputField::BuyFiat => TradeAmounts {
                sell_amount_sell_asset_crypto_precision: quote_sell_plus_fees,
                buy_amount_buy_asset_crypto_precision: self.buy_human(self.buy_amount_before_fees_base_unit()?)?,
                fiat_sell_amount: quote_sell_plus_fees_fiat,
                fiat_buy_amount: self.buy_amount_after_fees_fiat()?,
            },
        };
        Ok(amounts)
    }
}

/// `amount × (1 − slippage)`
pub fn slippage_adjusted(amount: Decimal, slippage: Decimal) -> Decimal {
    amount * (Decimal::ONE - slippage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::quote;
    use crate::types::{eth, fox};
    use crate::utils::pow10_u256;
    use rust_decimal_macros::dec;

    fn eth_amount(milli: u64) -> U256 {
        U256::from(milli) * pow10_u256(15)
    }

    fn fox_amount(whole: u64) -> U256 {
        U256::from(whole) * pow10_u256(18)
    }

    /// ETH at 2000, FOX at 0.05, a $10 sell side fee and a $5 buy side fee.
    fn state(action: TradeAmountInputField, amount: Decimal) -> TradeAmountState {
        TradeAmountState {
            action,
            amount,
            sell_asset: eth(),
            buy_asset: fox(),
            sell_asset_fiat_rate: dec!(2000),
            buy_asset_fiat_rate: dec!(0.05),
            selected_currency_to_usd_rate: Decimal::ONE,
            sell_asset_trade_fee_usd: dec!(10),
            buy_asset_trade_fee_usd: dec!(5),
            quote: None,
            slippage: dec!(0.01),
        }
    }

    #[test]
    fn amounts_before_fees_follow_the_input_field() {
        let sell = state(TradeAmountInputField::SellCrypto, dec!(1));
        assert_eq!(sell.asset_price_ratio(), dec!(0.000025));
        assert_eq!(sell.sell_amount_before_fees_base_unit().unwrap(), eth_amount(1000));
        assert_eq!(sell.buy_amount_before_fees_base_unit().unwrap(), fox_amount(40_000));

        let buy = state(TradeAmountInputField::BuyCrypto, dec!(40000));
        assert_eq!(buy.sell_amount_before_fees_base_unit().unwrap(), eth_amount(1000));

        let buy_fiat = state(TradeAmountInputField::BuyFiat, dec!(100));
        assert_eq!(buy_fiat.buy_amount_before_fees_base_unit().unwrap(), fox_amount(2000));
        assert_eq!(buy_fiat.sell_amount_before_fees_base_unit().unwrap(), eth_amount(50));
    }

    #[test]
    fn fees_convert_across_assets() {
        let s = state(TradeAmountInputField::SellCrypto, dec!(1));
        assert_eq!(s.sell_asset_trade_fee_sell_asset_base_unit().unwrap(), eth_amount(5));
        assert_eq!(s.sell_asset_trade_fee_buy_asset_base_unit().unwrap(), fox_amount(200));
        assert_eq!(s.buy_asset_trade_fee_buy_asset_base_unit().unwrap(), fox_amount(100));
        assert_eq!(s.buy_asset_trade_fee_sell_asset_base_unit().unwrap(), U256::from(2_500_000_000_000_000u64));
        assert_eq!(s.total_trade_fee_buy_asset_base_unit().unwrap(), fox_amount(300));
        assert_eq!(s.total_trade_fee_sell_asset_base_unit().unwrap(), U256::from(7_500_000_000_000_000u64));
    }

    #[test]
    fn fees_use_the_selected_currency() {
        let mut s = state(TradeAmountInputField::SellCrypto, dec!(1));
        // EUR display: $10 is 9 EUR, ETH at 1800 EUR
        s.selected_currency_to_usd_rate = dec!(0.9);
        s.sell_asset_fiat_rate = dec!(1800);
        assert_eq!(s.sell_asset_trade_fee_sell_asset_base_unit().unwrap(), eth_amount(5));
    }

    #[test]
    fn after_fee_amounts() {
        let s = state(TradeAmountInputField::SellCrypto, dec!(1));
        assert_eq!(s.buy_amount_after_fees_base_unit().unwrap(), fox_amount(39_700));
        assert_eq!(s.buy_amount_after_fees_fiat().unwrap(), dec!(1985));
        assert_eq!(s.sell_amount_plus_fees_base_unit().unwrap(), U256::from(1_007_500_000_000_000_000u64));
        assert_eq!(s.sell_amount_plus_fees_fiat().unwrap(), dec!(2015));
    }

    #[test]
    fn fees_larger_than_the_trade_saturate_to_zero() {
        let mut s = state(TradeAmountInputField::SellCrypto, dec!(0.001));
        s.sell_asset_trade_fee_usd = dec!(100);
        assert_eq!(s.buy_amount_after_fees_base_unit().unwrap(), U256::ZERO);
    }

    #[test]
    fn unknown_fiat_rate_zeroes_dependent_figures() {
        let mut s = state(TradeAmountInputField::SellFiat, dec!(100));
        s.sell_asset_fiat_rate = Decimal::ZERO;
        assert_eq!(s.asset_price_ratio(), Decimal::ZERO);
        assert_eq!(s.sell_amount_before_fees_base_unit().unwrap(), U256::ZERO);
        assert_eq!(s.sell_asset_trade_fee_sell_asset_base_unit().unwrap(), U256::ZERO);
    }

    #[test]
    fn quote_figures_subtract_both_fees() {
        let mut s = state(TradeAmountInputField::SellCrypto, dec!(1));
        assert_eq!(s.quote_buy_amount_after_fees_base_unit().unwrap(), None);
        s.quote = Some(quote(eth(), fox(), eth_amount(1000), fox_amount(39_000)));

        assert_eq!(s.quote_buy_amount_after_fees_base_unit().unwrap(), Some(fox_amount(38_700)));
        assert_eq!(s.quote_buy_amount_after_fees_fiat().unwrap(), Some(dec!(1935)));
        assert_eq!(s.quote_sell_amount_plus_fees_base_unit().unwrap(), Some(eth_amount(1005)));
        assert_eq!(s.quote_sell_amount_plus_fees_fiat().unwrap(), Some(dec!(2010)));
    }

    #[test]
    fn amounts_by_action_leave_the_other_side_empty() {
        let amounts = state(TradeAmountInputField::SellFiat, dec!(100)).trade_amounts_by_action().unwrap();
        assert_eq!(
            amounts,
            TradeAmounts {
                sell_amount_sell_asset_crypto_precision: dec!(0.05),
                fiat_sell_amount: dec!(100),
                ..Default::default()
            }
        );

        let amounts = state(TradeAmountInputField::BuyCrypto, dec!(40000)).trade_amounts_by_action().unwrap();
        assert_eq!(amounts.fiat_buy_amount, dec!(2000));
        assert_eq!(amounts.sell_amount_sell_asset_crypto_precision, Decimal::ZERO);
    }

    #[test]
    fn amounts_from_quote_apply_slippage() {
        let mut s = state(TradeAmountInputField::SellCrypto, dec!(1));
        s.quote = Some(quote(eth(), fox(), eth_amount(1000), fox_amount(39_000)));

        let amounts = s.trade_amounts_from_quote().unwrap();
        assert_eq!(amounts.sell_amount_sell_asset_crypto_precision, dec!(1));
        assert_eq!(amounts.buy_amount_buy_asset_crypto_precision, dec!(38313));
        assert_eq!(amounts.fiat_sell_amount, dec!(2000));
        assert_eq!(amounts.fiat_buy_amount, dec!(1935));

        s.action = TradeAmountInputField::BuyCrypto;
        s.amount = dec!(40000);
        let amounts = s.trade_amounts_from_quote().unwrap();
        assert_eq!(amounts.sell_amount_sell_asset_crypto_precision, dec!(1.005));
        assert_eq!(amounts.buy_amount_buy_asset_crypto_precision, dec!(39700));
        assert_eq!(amounts.fiat_sell_amount, dec!(2010));
        assert_eq!(amounts.fiat_buy_amount, dec!(2000));
    }

    #[test]
    fn empty_amount_from_quote_is_all_zero() {
        let amounts = state(TradeAmountInputField::SellCrypto, Decimal::ZERO).trade_amounts_from_quote().unwrap();
        assert_eq!(amounts, TradeAmounts::default());
    }

    #[test]
    fn slippage_scales_down() {
        assert_eq!(slippage_adjusted(dec!(200), dec!(0.005)), dec!(199));
    }
}
