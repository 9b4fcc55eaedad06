//! The venue capability every swapper implements

use alloy::primitives::U256;
use async_trait::async_trait;
use rust_decimal::Decimal;
use crate::{
    chain::Wallet,
    errors::{SwapError, SwapErrorType, SwapResult},
    types::{
        ApprovalNeeded, Asset, AssetId, BuildTradeInput, GetTradeQuoteInput, MinMax, SwapperName, Trade,
        TradeQuote, TradeResult, TradeTxs,
    },
};

#[async_trait]
pub trait Swapper: Send + Sync {
    fn name(&self) -> SwapperName;

    /// One-off async setup run before the swapper is registered.
    async fn initialize(&self) -> SwapResult<()> {
        Ok(())
    }

    async fn get_trade_quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote>;

    async fn build_trade(&self, input: &BuildTradeInput) -> SwapResult<Trade>;

    async fn execute_trade(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult>;

    async fn get_trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs>;

    async fn get_usd_rate(&self, asset: &Asset) -> SwapResult<Decimal>;

    async fn get_min_max(&self, sell_asset: &Asset) -> SwapResult<MinMax>;

    async fn approval_needed(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<ApprovalNeeded>;

    /// Returns the approval txid.
    async fn approve_infinite(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<String>;

    /// Approves `amount`, or the quote's sell amount when `None`.
    async fn approve_amount(
        &self,
        quote: &TradeQuote,
        wallet: &dyn Wallet,
        amount: Option<U256>,
    ) -> SwapResult<String>;

    fn filter_buy_assets_by_sell_asset_id(&self, sell_asset_id: &AssetId, asset_ids: &[AssetId]) -> Vec<AssetId>;

    fn filter_asset_ids_by_sellable(&self, asset_ids: &[AssetId]) -> Vec<AssetId>;
}

/// Minimum sell amount worth one USD, the default venue floor.
pub fn one_usd_minimum(usd_rate: Decimal) -> SwapResult<Decimal> {
    Decimal::ONE.checked_div(usd_rate).ok_or_else(|| {
        SwapError::new(SwapErrorType::ResponseError, "usd rate is zero")
    })
}

/// Receive addresses are mandatory for trades that pay out to the caller.
pub fn require_receive_address(input: &BuildTradeInput, venue: &str) -> SwapResult<()> {
    if input.receive_address.trim().is_empty() {
        return Err(SwapError::new(
            SwapErrorType::BuildTradeFailed,
            format!("[{}] receive address is required", venue),
        ));
    }
    Ok(())
}

pub fn require_sell_amount(input: &BuildTradeInput, venue: &str) -> SwapResult<()> {
    if input.sell_amount_before_fees_crypto_base_unit.is_zero() {
        return Err(SwapError::new(
            SwapErrorType::BuildTradeFailed,
            format!("[{}] sell amount is required", venue),
        ));
    }
    Ok(())
}
