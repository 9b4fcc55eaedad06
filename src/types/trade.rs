//! Executable trades and their outcomes

use alloy::primitives::{Address, B256, Bytes, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use super::{Asset, QuoteFeeData, SwapSource, TradeQuote};

/// 0x forwards the aggregator's calldata to the chain adapter untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZrxTradePayload {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: U256,
}

/// Transaction request returned with a LI.FI quote, sent as is on the
/// sell chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifiTradePayload {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
}

/// Order parameters signed with EIP-712 and posted to the CoW relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CowTradePayload {
    pub sell_token: Address,
    pub buy_token: Address,
    pub receiver: Address,
    pub sell_amount_deduct_fee_crypto_base_unit: U256,
    pub fee_amount_in_sell_token_crypto_base_unit: U256,
    pub buy_amount_crypto_base_unit: U256,
    pub valid_to: u32,
    pub app_data: B256,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ThorchainTradePayload {
    /// `depositWithExpiry` call against the THORChain router.
    Evm {
        router: Address,
        data: Bytes,
        value: U256,
    },
    /// Plain send to the inbound vault with the swap memo attached.
    Memo {
        inbound_address: String,
        memo: String,
        amount_crypto_base_unit: U256,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TradePayload {
    Zrx(ZrxTradePayload),
    Cow(CowTradePayload),
    Thorchain(ThorchainTradePayload),
    Osmosis,
    Lifi(LifiTradePayload),
}

/// A quote bound to execution parameters. Consumed by `execute_trade`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub sell_asset: Asset,
    pub buy_asset: Asset,
    pub sell_amount_before_fees_crypto_base_unit: U256,
    pub buy_amount_crypto_base_unit: U256,
    pub rate: Decimal,
    pub fee_data: QuoteFeeData,
    pub sources: Vec<SwapSource>,
    pub account_number: u32,
    pub receive_address: String,
    pub receive_account_number: Option<u32>,
    pub payload: TradePayload,
}

impl Trade {
    pub fn from_quote(
        quote: TradeQuote,
        receive_address: String,
        receive_account_number: Option<u32>,
        payload: TradePayload,
    ) -> Self {
        Self {
            sell_asset: quote.sell_asset,
            buy_asset: quote.buy_asset,
            sell_amount_before_fees_crypto_base_unit: quote.sell_amount_before_fees_crypto_base_unit,
            buy_amount_crypto_base_unit: quote.buy_amount_crypto_base_unit,
            rate: quote.rate,
            fee_data: quote.fee_data,
            sources: quote.sources,
            account_number: quote.account_number,
            receive_address,
            receive_account_number,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeResult {
    pub trade_id: String,
    pub previous_cosmos_txid: Option<String>,
    pub cosmos_address: Option<String>,
}

impl TradeResult {
    pub fn new(trade_id: impl Into<String>) -> Self {
        Self {
            trade_id: trade_id.into(),
            previous_cosmos_txid: None,
            cosmos_address: None,
        }
    }
}

/// Settlement transaction ids. An empty string means not yet known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeTxs {
    pub sell_txid: String,
    pub buy_txid: String,
}
