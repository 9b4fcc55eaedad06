//! CoW Protocol venue: off-chain quotes, EIP-712 signed orders settled by solvers

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::{eip712_domain, SolStruct};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use crate::{
    allowance::{
        approval_fee, approve_amount, approve_infinite, encode_approve, evm_approval_needed,
        is_approval_required, MAX_ALLOWANCE,
    },
    chain::{ChainAdapter, FeeDataInput, Wallet},
    config::{
        COW_SWAP_APP_DATA, COW_SWAP_ORDER_VALIDITY_SECS, COW_SWAP_SETTLEMENT_ADDRESS,
        COW_SWAP_VAULT_RELAYER_ADDRESS, MAX_COWSWAP_TRADE, MIN_COWSWAP_VALUE_USD,
    },
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    network::VenueClient,
    swapper::{require_sell_amount, Swapper},
    types::{
        ApprovalNeeded, Asset, AssetId, BuildTradeInput, ChainId, CowTradePayload, EvmFeeData,
        GetTradeQuoteInput, MinMax, QuoteFeeData, SwapSource, SwapperName, Trade, TradePayload, TradeQuote,
        TradeResult, TradeTxs, ETHEREUM_MAINNET, NATIVE_TOKEN_PLACEHOLDER, USDC_MAINNET, WETH_MAINNET,
    },
    utils::{base_unit_to_decimal, decimal_to_base_unit, rate_from_base_units, round_rate, ExactDecimal},
    validation::{parse_base_units, validate_usd_rate},
};

const ORDER_KIND_SELL: &str = "sell";
const ORDER_KIND_BUY: &str = "buy";
const ERC20_BALANCE: &str = "erc20";
const SIGNING_SCHEME: &str = "eip712";
const ORDER_STATUS_FULFILLED: &str = "fulfilled";

/// 1000 USDC, the buy side of a usd rate probe.
const USD_RATE_PROBE_AMOUNT: &str = "1000000000";
const USD_RATE_PROBE_USD: Decimal = dec!(1000);

sol! {
    #[derive(Debug)]
    struct Order {
        address sellToken;
        address buyToken;
        address receiver;
        uint256 sellAmount;
        uint256 buyAmount;
        uint32 validTo;
        bytes32 appData;
        uint256 feeAmount;
        string kind;
        bool partiallyFillable;
        string sellTokenBalance;
        string buyTokenBalance;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SellQuoteRequest {
    sell_token: String,
    buy_token: String,
    receiver: String,
    valid_to: u32,
    app_data: String,
    partially_fillable: bool,
    from: String,
    kind: &'static str,
    sell_amount_before_fee: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyQuoteRequest {
    sell_token: String,
    buy_token: String,
    receiver: String,
    valid_to: u32,
    app_data: String,
    partially_fillable: bool,
    from: String,
    kind: &'static str,
    buy_amount_after_fee: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteDetails {
    sell_amount: String,
    buy_amount: String,
    #[serde(default)]
    fee_amount: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct QuoteResponse {
    quote: QuoteDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest {
    sell_token: String,
    buy_token: String,
    receiver: String,
    sell_amount: String,
    buy_amount: String,
    valid_to: u32,
    app_data: String,
    fee_amount: String,
    kind: &'static str,
    partially_fillable: bool,
    sell_token_balance: &'static str,
    buy_token_balance: &'static str,
    signing_scheme: &'static str,
    signature: String,
    from: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OrderStatus {
    status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderTrade {
    tx_hash: String,
}

/// Amounts of one sell quote, in base units.
struct SellQuote {
    sell_amount_after_fee: U256,
    buy_amount: U256,
    fee_amount: U256,
}

/// USD value of the venue fee, which CoW takes out of the sell amount.
pub fn sell_asset_trade_fee_usd(fee_amount: U256, sell_precision: u32, sell_usd_rate: Decimal) -> SwapResult<ExactDecimal> {
    ExactDecimal::from_base_units_times(fee_amount, sell_precision, sell_usd_rate)
}

fn order_valid_to() -> u32 {
    u32::try_from(Utc::now().timestamp() + COW_SWAP_ORDER_VALIDITY_SECS).unwrap_or(u32::MAX)
}

pub struct CowSwapper {
    adapter: Arc<dyn ChainAdapter>,
    chain_id: ChainId,
    client: VenueClient,
    api_url: String,
}

impl CowSwapper {
    pub fn new(adapter: Arc<dyn ChainAdapter>, api_url: &str, timeout: Duration) -> SwapResult<Self> {
        if adapter.chain_id().as_str() != ETHEREUM_MAINNET {
            return Err(SwapError::new(
                SwapErrorType::UnsupportedChain,
                format!("CoW Swap only settles on {}, got {}", ETHEREUM_MAINNET, adapter.chain_id()),
            ));
        }
        Ok(Self {
            chain_id: adapter.chain_id(),
            adapter,
            client: VenueClient::new("CoW Swap", timeout)?,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn is_sellable(&self, asset_id: &AssetId) -> bool {
        asset_id.chain_id() == self.chain_id && asset_id.is_erc20()
    }

    fn is_buyable(&self, asset_id: &AssetId) -> bool {
        self.is_sellable(asset_id) || *asset_id == self.adapter.fee_asset_id()
    }

    fn check_pair(&self, sell: &Asset, buy: &Asset, context: &str) -> SwapResult<()> {
        if !self.is_sellable(&sell.asset_id) {
            return Err(SwapError::new(
                SwapErrorType::UnsupportedPair,
                format!("[{}] - Sell asset needs to be ERC-20 to use CowSwap", context),
            )
            .with_details(serde_json::json!({ "sellAssetNamespace": sell.asset_id.asset_namespace() })));
        }
        if !self.is_buyable(&buy.asset_id) {
            return Err(SwapError::new(
                SwapErrorType::UnsupportedPair,
                format!("[{}] - Buy asset needs to be ERC-20 or ETH to use CowSwap", context),
            )
            .with_details(serde_json::json!({ "buyAssetId": buy.asset_id.as_str() })));
        }
        Ok(())
    }

    /// Token address the relay knows the asset by. ETH can only be bought,
    /// through the native placeholder.
    fn buy_token(asset: &Asset) -> Address {
        asset.erc20_address().unwrap_or(NATIVE_TOKEN_PLACEHOLDER)
    }

    async fn sell_quote(
        &self,
        sell_asset: &Asset,
        buy_asset: &Asset,
        sell_amount: U256,
        receiver: &str,
    ) -> SwapResult<SellQuote> {
        let sell_token = sell_asset.erc20_address().ok_or_else(|| {
            SwapError::new(SwapErrorType::UnsupportedPair, "Sell asset needs to be ERC-20 to use CowSwap")
        })?;
        let request = SellQuoteRequest {
            sell_token: format!("{:#x}", sell_token),
            buy_token: format!("{:#x}", Self::buy_token(buy_asset)),
            receiver: receiver.to_string(),
            valid_to: order_valid_to(),
            app_data: format!("{:#x}", COW_SWAP_APP_DATA),
            partially_fillable: false,
            from: receiver.to_string(),
            kind: ORDER_KIND_SELL,
            sell_amount_before_fee: sell_amount.to_string(),
        };
        let response: QuoteResponse = self
            .client
            .post_json(&format!("{}/v1/quote/", self.api_url), &request)
            .await?;

        Ok(SellQuote {
            sell_amount_after_fee: parse_base_units(&response.quote.sell_amount, "sellAmount")?,
            buy_amount: parse_base_units(&response.quote.buy_amount, "buyAmount")?,
            fee_amount: parse_base_units(response.quote.fee_amount.as_deref().unwrap_or("0"), "feeAmount")?,
        })
    }

    /// Gas estimate of the fast tier, priced for the approve call CoW needs.
    async fn gas_estimate(&self, sell_asset: &Asset, from: &str) -> SwapResult<(U256, U256)> {
        let token = sell_asset.erc20_address().unwrap_or_default();
        let fee_data = self
            .adapter
            .get_fee_data(&FeeDataInput {
                to: format!("{:#x}", token),
                value: U256::ZERO,
                from: Some(from.to_string()),
                data: Some(encode_approve(COW_SWAP_VAULT_RELAYER_ADDRESS, MAX_ALLOWANCE)),
            })
            .await?;
        match (fee_data.fast.gas_limit, fee_data.fast.gas_price) {
            (Some(gas_limit), Some(gas_price)) => Ok((gas_limit, gas_price)),
            _ => Err(SwapError::new(
                SwapErrorType::ResponseError,
                "no gas limit or gas price in fee data",
            )),
        }
    }

    async fn quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.check_pair(&input.sell_asset, &input.buy_asset, "cowGetTradeQuote")?;

        let usd_rate = self.get_usd_rate(&input.sell_asset).await?;
        let min_max = self.min_max_from_rate(usd_rate)?;
        let minimum = decimal_to_base_unit(min_max.minimum_amount_crypto_human, input.sell_asset.precision)?;
        let sell_amount = input.sell_amount_before_fees_crypto_base_unit.max(minimum);

        let receiver = input
            .receive_address
            .clone()
            .unwrap_or_else(|| format!("{:#x}", Address::ZERO));
        let quote = self
            .sell_quote(&input.sell_asset, &input.buy_asset, sell_amount, &receiver)
            .await?;
        let (gas_limit, gas_price) = self.gas_estimate(&input.sell_asset, &receiver).await?;

        Ok(TradeQuote {
            rate: rate_from_base_units(
                quote.buy_amount,
                input.buy_asset.precision,
                quote.sell_amount_after_fee,
                input.sell_asset.precision,
            )?,
            fee_data: QuoteFeeData {
                network_fee_crypto_base_unit: U256::ZERO,
                sell_asset_trade_fee_usd: sell_asset_trade_fee_usd(
                    quote.fee_amount,
                    input.sell_asset.precision,
                    usd_rate,
                )?,
                buy_asset_trade_fee_usd: ExactDecimal::ZERO,
                chain_specific: Some(EvmFeeData {
                    estimated_gas_crypto_base_unit: gas_limit,
                    gas_price_crypto_base_unit: gas_price,
                    approval_fee_crypto_base_unit: Some(approval_fee(gas_price)),
                }),
            },
            sell_amount_before_fees_crypto_base_unit: sell_amount,
            buy_amount_crypto_base_unit: quote.buy_amount,
            minimum_crypto_human: min_max.minimum_amount_crypto_human,
            maximum_crypto_human: min_max.maximum_amount_crypto_human,
            allowance_contract: Some(COW_SWAP_VAULT_RELAYER_ADDRESS),
            account_number: input.account_number,
            sources: SwapSource::whole(SwapperName::CowSwap.to_string()),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        })
    }

    async fn build(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        self.check_pair(&input.sell_asset, &input.buy_asset, "cowBuildTrade")?;
        require_sell_amount(input, "cowBuildTrade")?;

        // Orders always pay out to the signing account.
        let receiver = self
            .adapter
            .get_address(input.wallet.as_ref(), input.account_number)
            .await?;
        let quote = self
            .sell_quote(
                &input.sell_asset,
                &input.buy_asset,
                input.sell_amount_before_fees_crypto_base_unit,
                &receiver,
            )
            .await?;
        let usd_rate = self.get_usd_rate(&input.sell_asset).await?;
        let (gas_limit, gas_price) = self.gas_estimate(&input.sell_asset, &receiver).await?;

        let approval_required = is_approval_required(
            self.adapter.as_ref(),
            &receiver,
            COW_SWAP_VAULT_RELAYER_ADDRESS,
            &input.sell_asset,
            quote.sell_amount_after_fee,
        )
        .await?;

        let receiver_address: Address = receiver
            .parse()
            .swap_err(SwapErrorType::BuildTradeFailed, "[cowBuildTrade] invalid receive address")?;
        let sell_token = input.sell_asset.erc20_address().unwrap_or_default();

        let trade_quote = TradeQuote {
            rate: rate_from_base_units(
                quote.buy_amount,
                input.buy_asset.precision,
                quote.sell_amount_after_fee,
                input.sell_asset.precision,
            )?,
            fee_data: QuoteFeeData {
                network_fee_crypto_base_unit: U256::ZERO,
                sell_asset_trade_fee_usd: sell_asset_trade_fee_usd(
                    quote.fee_amount,
                    input.sell_asset.precision,
                    usd_rate,
                )?,
                buy_asset_trade_fee_usd: ExactDecimal::ZERO,
                chain_specific: Some(EvmFeeData {
                    estimated_gas_crypto_base_unit: gas_limit,
                    gas_price_crypto_base_unit: gas_price,
                    approval_fee_crypto_base_unit: approval_required.then(|| approval_fee(gas_price)),
                }),
            },
            sell_amount_before_fees_crypto_base_unit: input.sell_amount_before_fees_crypto_base_unit,
            buy_amount_crypto_base_unit: quote.buy_amount,
            minimum_crypto_human: Decimal::ZERO,
            maximum_crypto_human: Decimal::ZERO,
            allowance_contract: Some(COW_SWAP_VAULT_RELAYER_ADDRESS),
            account_number: input.account_number,
            sources: SwapSource::whole(SwapperName::CowSwap.to_string()),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        };
        let payload = TradePayload::Cow(CowTradePayload {
            sell_token,
            buy_token: Self::buy_token(&input.buy_asset),
            receiver: receiver_address,
            sell_amount_deduct_fee_crypto_base_unit: quote.sell_amount_after_fee,
            fee_amount_in_sell_token_crypto_base_unit: quote.fee_amount,
            buy_amount_crypto_base_unit: quote.buy_amount,
            valid_to: order_valid_to(),
            app_data: COW_SWAP_APP_DATA,
        });
        Ok(Trade::from_quote(trade_quote, receiver, input.receive_account_number, payload))
    }

    async fn execute(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        let TradePayload::Cow(payload) = trade.payload else {
            return Err(SwapError::new(SwapErrorType::ValidationFailed, "[cowExecuteTrade] not a CoW trade"));
        };
        let owner = wallet.evm_address().ok_or_else(|| {
            SwapError::new(SwapErrorType::SignAndBroadcastFailed, "[cowExecuteTrade] wallet has no EVM account")
        })?;

        let hash = order_signing_hash(&payload, self.adapter_evm_chain_id());
        let signature = wallet.sign_evm_hash(hash).await?;

        let request = OrderRequest {
            sell_token: format!("{:#x}", payload.sell_token),
            buy_token: format!("{:#x}", payload.buy_token),
            receiver: format!("{:#x}", payload.receiver),
            sell_amount: payload.sell_amount_deduct_fee_crypto_base_unit.to_string(),
            buy_amount: payload.buy_amount_crypto_base_unit.to_string(),
            valid_to: payload.valid_to,
            app_data: format!("{:#x}", payload.app_data),
            fee_amount: payload.fee_amount_in_sell_token_crypto_base_unit.to_string(),
            kind: ORDER_KIND_SELL,
            partially_fillable: false,
            sell_token_balance: ERC20_BALANCE,
            buy_token_balance: ERC20_BALANCE,
            signing_scheme: SIGNING_SCHEME,
            signature: signature.to_string(),
            from: format!("{:#x}", owner),
        };
        let uid: String = self
            .client
            .post_json(&format!("{}/v1/orders/", self.api_url), &request)
            .await?;
        info!("🐮 CoW order {} placed: {} -> {}", uid, trade.sell_asset.symbol, trade.buy_asset.symbol);
        Ok(TradeResult::new(uid))
    }

    async fn trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        let order: OrderStatus = self
            .client
            .get_json(&format!("{}/v1/orders/{}", self.api_url, result.trade_id), &[])
            .await?;
        if order.status != ORDER_STATUS_FULFILLED {
            debug!("CoW order {} is {}", result.trade_id, order.status);
            return Ok(TradeTxs {
                sell_txid: String::new(),
                buy_txid: String::new(),
            });
        }

        let trades: Vec<OrderTrade> = self
            .client
            .get_json(
                &format!("{}/v1/trades/", self.api_url),
                &[("orderUid", result.trade_id.clone())],
            )
            .await?;
        let buy_txid = trades.first().map(|t| t.tx_hash.clone()).unwrap_or_default();
        Ok(TradeTxs {
            sell_txid: result.trade_id.clone(),
            buy_txid,
        })
    }

    fn adapter_evm_chain_id(&self) -> u64 {
        self.chain_id.evm_chain_id().unwrap_or(1)
    }

    fn min_max_from_rate(&self, usd_rate: Decimal) -> SwapResult<MinMax> {
        let minimum = MIN_COWSWAP_VALUE_USD
            .checked_div(usd_rate)
            .ok_or_else(|| SwapError::new(SwapErrorType::ResponseError, "usd rate is zero"))?;
        Ok(MinMax {
            minimum_amount_crypto_human: minimum,
            maximum_amount_crypto_human: MAX_COWSWAP_TRADE
                .parse()
                .swap_err(SwapErrorType::ValidationFailed, "invalid CoW Swap maximum")?,
        })
    }
}

/// EIP-712 digest the owner signs for `payload` under the settlement domain.
pub fn order_signing_hash(payload: &CowTradePayload, chain_id: u64) -> B256 {
    let domain = eip712_domain! {
        name: "Gnosis Protocol",
        version: "v2",
        chain_id: chain_id,
        verifying_contract: COW_SWAP_SETTLEMENT_ADDRESS,
    };
    let order = Order {
        sellToken: payload.sell_token,
        buyToken: payload.buy_token,
        receiver: payload.receiver,
        sellAmount: payload.sell_amount_deduct_fee_crypto_base_unit,
        buyAmount: payload.buy_amount_crypto_base_unit,
        validTo: payload.valid_to,
        appData: payload.app_data,
        feeAmount: payload.fee_amount_in_sell_token_crypto_base_unit,
        kind: ORDER_KIND_SELL.to_string(),
        partiallyFillable: false,
        sellTokenBalance: ERC20_BALANCE.to_string(),
        buyTokenBalance: ERC20_BALANCE.to_string(),
    };
    order.eip712_signing_hash(&domain)
}

#[async_trait]
impl Swapper for CowSwapper {
    fn name(&self) -> SwapperName {
        SwapperName::CowSwap
    }

    async fn get_trade_quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.quote(input)
            .await
            .swap_err(SwapErrorType::TradeQuoteFailed, "[cowGetTradeQuote]")
    }

    async fn build_trade(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        self.build(input)
            .await
            .swap_err(SwapErrorType::BuildTradeFailed, "[cowBuildTrade]")
    }

    async fn execute_trade(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        self.execute(trade, wallet)
            .await
            .swap_err(SwapErrorType::ExecuteTradeFailed, "[cowExecuteTrade]")
    }

    async fn get_trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        self.trade_txs(result)
            .await
            .swap_err(SwapErrorType::GetTradeTxsFailed, "[cowGetTradeTxs]")
    }

    async fn get_usd_rate(&self, asset: &Asset) -> SwapResult<Decimal> {
        if asset.erc20_address() == Some(USDC_MAINNET) {
            return Ok(Decimal::ONE);
        }
        // ETH is priced through WETH, which has the same precision.
        let sell_token = asset.erc20_address().unwrap_or(WETH_MAINNET);
        let zero = format!("{:#x}", Address::ZERO);
        let request = BuyQuoteRequest {
            sell_token: format!("{:#x}", sell_token),
            buy_token: format!("{:#x}", USDC_MAINNET),
            receiver: zero.clone(),
            valid_to: order_valid_to(),
            app_data: format!("{:#x}", COW_SWAP_APP_DATA),
            partially_fillable: false,
            from: zero,
            kind: ORDER_KIND_BUY,
            buy_amount_after_fee: USD_RATE_PROBE_AMOUNT,
        };
        let response: QuoteResponse = self
            .client
            .post_json(&format!("{}/v1/quote/", self.api_url), &request)
            .await?;

        let sell_amount = base_unit_to_decimal(
            parse_base_units(&response.quote.sell_amount, "sellAmount")?,
            asset.precision,
        )?;
        let rate = USD_RATE_PROBE_USD
            .checked_div(sell_amount)
            .map(round_rate)
            .unwrap_or(Decimal::ZERO);
        debug!("CoW USD rate for {}: {}", asset.symbol, rate);
        validate_usd_rate(rate, asset, "CoW Swap")
    }

    async fn get_min_max(&self, sell_asset: &Asset) -> SwapResult<MinMax> {
        let usd_rate = self.get_usd_rate(sell_asset).await?;
        self.min_max_from_rate(usd_rate)
    }

    async fn approval_needed(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<ApprovalNeeded> {
        evm_approval_needed(self.adapter.as_ref(), wallet, quote).await
    }

    async fn approve_infinite(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<String> {
        approve_infinite(self.adapter.as_ref(), wallet, quote).await
    }

    async fn approve_amount(&self, quote: &TradeQuote, wallet: &dyn Wallet, amount: Option<U256>) -> SwapResult<String> {
        approve_amount(self.adapter.as_ref(), wallet, quote, amount).await
    }

    fn filter_buy_assets_by_sell_asset_id(&self, sell_asset_id: &AssetId, asset_ids: &[AssetId]) -> Vec<AssetId> {
        if !self.is_sellable(sell_asset_id) {
            return Vec::new();
        }
        asset_ids
            .iter()
            .filter(|id| *id != sell_asset_id && self.is_buyable(id))
            .cloned()
            .collect()
    }

    fn filter_asset_ids_by_sellable(&self, asset_ids: &[AssetId]) -> Vec<AssetId> {
        asset_ids.iter().filter(|id| self.is_sellable(id)).cloned().collect()
    }
}
