//! Quote inputs and outputs

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use crate::chain::Wallet;
use crate::utils::ExactDecimal;
use super::{Asset, ChainId, SwapSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvmFeeData {
    pub estimated_gas_crypto_base_unit: U256,
    pub gas_price_crypto_base_unit: U256,
    pub approval_fee_crypto_base_unit: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteFeeData {
    pub network_fee_crypto_base_unit: U256,
    pub sell_asset_trade_fee_usd: ExactDecimal,
    pub buy_asset_trade_fee_usd: ExactDecimal,
    pub chain_specific: Option<EvmFeeData>,
}

impl QuoteFeeData {
    pub fn network_only(network_fee_crypto_base_unit: U256) -> Self {
        Self {
            network_fee_crypto_base_unit,
            sell_asset_trade_fee_usd: ExactDecimal::ZERO,
            buy_asset_trade_fee_usd: ExactDecimal::ZERO,
            chain_specific: None,
        }
    }

    pub fn gas_price(&self) -> Option<U256> {
        self.chain_specific.as_ref().map(|c| c.gas_price_crypto_base_unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinMax {
    pub minimum_amount_crypto_human: Decimal,
    pub maximum_amount_crypto_human: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetTradeQuoteInput {
    pub chain_id: ChainId,
    pub sell_asset: Asset,
    pub buy_asset: Asset,
    pub sell_amount_before_fees_crypto_base_unit: U256,
    pub account_number: u32,
    pub send_max: bool,
    pub receive_address: Option<String>,
}

impl GetTradeQuoteInput {
    pub fn new(sell_asset: Asset, buy_asset: Asset, sell_amount_before_fees_crypto_base_unit: U256) -> Self {
        Self {
            chain_id: sell_asset.chain_id.clone(),
            sell_asset,
            buy_asset,
            sell_amount_before_fees_crypto_base_unit,
            account_number: 0,
            send_max: false,
            receive_address: None,
        }
    }
}

#[derive(Clone)]
pub struct BuildTradeInput {
    pub chain_id: ChainId,
    pub sell_asset: Asset,
    pub buy_asset: Asset,
    pub sell_amount_before_fees_crypto_base_unit: U256,
    pub account_number: u32,
    pub receive_account_number: Option<u32>,
    pub receive_address: String,
    pub send_max: bool,
    pub slippage: Option<Decimal>,
    pub wallet: Arc<dyn Wallet>,
}

impl BuildTradeInput {
    pub fn quote_input(&self) -> GetTradeQuoteInput {
        GetTradeQuoteInput {
            chain_id: self.chain_id.clone(),
            sell_asset: self.sell_asset.clone(),
            buy_asset: self.buy_asset.clone(),
            sell_amount_before_fees_crypto_base_unit: self.sell_amount_before_fees_crypto_base_unit,
            account_number: self.account_number,
            send_max: self.send_max,
            receive_address: Some(self.receive_address.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeQuote {
    pub sell_asset: Asset,
    pub buy_asset: Asset,
    pub sell_amount_before_fees_crypto_base_unit: U256,
    pub buy_amount_crypto_base_unit: U256,
    pub rate: Decimal,
    pub fee_data: QuoteFeeData,
    pub minimum_crypto_human: Decimal,
    pub maximum_crypto_human: Decimal,
    pub allowance_contract: Option<Address>,
    pub account_number: u32,
    pub sources: Vec<SwapSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApprovalNeeded {
    pub approval_needed: bool,
}
