//! 0x aggregator venue, one instance per EVM chain

use alloy::primitives::{address, Address, Bytes, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use crate::{
    allowance::{approval_fee, approve_amount, approve_infinite, evm_approval_needed},
    chain::{sign_and_send, BuildSendTxInput, ChainAdapter, TxKind, Wallet},
    config::{DEFAULT_SLIPPAGE, MAX_ZRX_TRADE},
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    network::VenueClient,
    swapper::{one_usd_minimum, require_receive_address, require_sell_amount, Swapper},
    types::{
        ApprovalNeeded, Asset, AssetId, BuildTradeInput, ChainId, EvmFeeData, GetTradeQuoteInput, MinMax,
        QuoteFeeData, SwapSource, SwapperName, Trade, TradePayload, TradeQuote, TradeResult, TradeTxs,
        ZrxTradePayload, AVALANCHE_MAINNET, BNB_SMART_CHAIN_MAINNET, ETHEREUM_MAINNET, OPTIMISM_MAINNET,
        POLYGON_MAINNET,
    },
    utils::{decimal_to_base_unit, pow10_u256, ExactDecimal},
    validation::{parse_base_units, parse_decimal, validate_usd_rate},
};

/// Chain a 0x instance serves and the USDC token it prices against.
pub struct ZrxChain {
    pub chain_id: &'static str,
    pub usdc: Address,
    pub usdc_precision: u32,
}

/// Chain and USDC token a 0x instance quotes against.
pub fn zrx_chain(name: SwapperName) -> Option<ZrxChain> {
    let chain = match name {
        SwapperName::ZrxEthereum => ZrxChain {
            chain_id: ETHEREUM_MAINNET,
            usdc: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            usdc_precision: 6,
        },
        SwapperName::ZrxAvalanche => ZrxChain {
            chain_id: AVALANCHE_MAINNET,
            usdc: address!("b97ef9ef8734c71904d8002f8b6bc66dd9c48a6e"),
            usdc_precision: 6,
        },
        SwapperName::ZrxOptimism => ZrxChain {
            chain_id: OPTIMISM_MAINNET,
            usdc: address!("7f5c764cbc14f9669b88837ca1490cca17c31607"),
            usdc_precision: 6,
        },
        SwapperName::ZrxBnbSmartChain => ZrxChain {
            chain_id: BNB_SMART_CHAIN_MAINNET,
            usdc: address!("8ac76a51cc950d9822d68b83fe1ad97b32cd580d"),
            usdc_precision: 18,
        },
        SwapperName::ZrxPolygon => ZrxChain {
            chain_id: POLYGON_MAINNET,
            usdc: address!("2791bca1f2de4661ed88a30c99a7a9449aa84174"),
            usdc_precision: 6,
        },
        _ => return None,
    };
    Some(chain)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZrxSource {
    name: String,
    proportion: String,
}

/// Shared shape of `/swap/v1/price` and `/swap/v1/quote`; only the latter
/// carries `to`/`data`/`value`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZrxResponse {
    price: String,
    #[serde(default)]
    buy_amount: Option<String>,
    #[serde(default)]
    sell_amount: Option<String>,
    #[serde(default)]
    gas: Option<String>,
    #[serde(default)]
    estimated_gas: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    allowance_target: Option<String>,
    #[serde(default)]
    sources: Vec<ZrxSource>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl ZrxResponse {
    fn estimated_gas(&self) -> SwapResult<U256> {
        match self.gas.as_deref().or(self.estimated_gas.as_deref()) {
            Some(gas) => parse_base_units(gas, "gas"),
            None => Ok(U256::ZERO),
        }
    }

    fn fee_data(&self, sell_asset: &Asset) -> SwapResult<QuoteFeeData> {
        let gas = self.estimated_gas()?;
        let gas_price = parse_base_units(self.gas_price.as_deref().unwrap_or("0"), "gasPrice")?;
        Ok(QuoteFeeData {
            network_fee_crypto_base_unit: gas * gas_price,
            sell_asset_trade_fee_usd: ExactDecimal::ZERO,
            buy_asset_trade_fee_usd: ExactDecimal::ZERO,
            chain_specific: Some(EvmFeeData {
                estimated_gas_crypto_base_unit: gas,
                gas_price_crypto_base_unit: gas_price,
                approval_fee_crypto_base_unit: sell_asset.asset_id.is_erc20().then(|| approval_fee(gas_price)),
            }),
        })
    }

    fn allowance_contract(&self) -> SwapResult<Option<Address>> {
        match self.allowance_target.as_deref() {
            Some(target) => {
                let target: Address = target
                    .parse()
                    .swap_err(SwapErrorType::ResponseError, "invalid allowanceTarget")?;
                Ok((!target.is_zero()).then_some(target))
            }
            None => Ok(None),
        }
    }

    fn sources(&self) -> Vec<SwapSource> {
        self.sources
            .iter()
            .filter_map(|s| {
                let proportion = s.proportion.parse::<Decimal>().ok()?;
                (proportion > Decimal::ZERO).then(|| SwapSource {
                    name: s.name.clone(),
                    proportion,
                })
            })
            .collect()
    }
}

pub struct ZrxSwapper {
    name: SwapperName,
    chain_id: ChainId,
    usdc: Address,
    usdc_precision: u32,
    adapter: Arc<dyn ChainAdapter>,
    client: VenueClient,
    base_url: String,
}

impl ZrxSwapper {
    pub fn new(name: SwapperName, adapter: Arc<dyn ChainAdapter>, base_url: &str, timeout: Duration) -> SwapResult<Self> {
        let chain = zrx_chain(name).ok_or_else(|| {
            SwapError::new(SwapErrorType::UnsupportedChain, format!("{:?} is not a 0x venue", name))
        })?;
        if adapter.chain_id().as_str() != chain.chain_id {
            return Err(SwapError::new(
                SwapErrorType::UnsupportedChain,
                format!("0x {:?} needs a {} adapter, got {}", name, chain.chain_id, adapter.chain_id()),
            ));
        }
        Ok(Self {
            name,
            chain_id: adapter.chain_id(),
            usdc: chain.usdc,
            usdc_precision: chain.usdc_precision,
            adapter,
            client: VenueClient::new("0x", timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn supports(&self, asset_id: &AssetId) -> bool {
        asset_id.chain_id() == self.chain_id && matches!(asset_id.asset_namespace(), "erc20" | "slip44")
    }

    fn check_pair(&self, sell: &Asset, buy: &Asset) -> SwapResult<()> {
        if !self.supports(&sell.asset_id) || !self.supports(&buy.asset_id) {
            return Err(SwapError::new(
                SwapErrorType::UnsupportedPair,
                format!("[0x] unsupported pair {} -> {}", sell.asset_id, buy.asset_id),
            )
            .with_details(serde_json::json!({
                "sellAssetChainId": sell.chain_id.as_str(),
                "buyAssetChainId": buy.chain_id.as_str(),
            })));
        }
        Ok(())
    }

    /// 0x takes token addresses for ERC20s and the symbol for the native asset.
    fn token(asset: &Asset) -> String {
        match asset.erc20_address() {
            Some(address) => format!("{:#x}", address),
            None => asset.symbol.clone(),
        }
    }

    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> SwapResult<ZrxResponse> {
        self.client
            .get_json(&format!("{}{}", self.base_url, path), query)
            .await
    }

    async fn quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.check_pair(&input.sell_asset, &input.buy_asset)?;
        let min_max = self.get_min_max(&input.sell_asset).await?;

        let sell_amount = if input.sell_amount_before_fees_crypto_base_unit.is_zero() {
            decimal_to_base_unit(min_max.minimum_amount_crypto_human, input.sell_asset.precision)?
        } else {
            input.sell_amount_before_fees_crypto_base_unit
        };

        let response = self
            .fetch(
                "/swap/v1/price",
                &[
                    ("sellToken", Self::token(&input.sell_asset)),
                    ("buyToken", Self::token(&input.buy_asset)),
                    ("sellAmount", sell_amount.to_string()),
                ],
            )
            .await?;

        Ok(TradeQuote {
            rate: parse_decimal(&response.price, "price")?,
            fee_data: response.fee_data(&input.sell_asset)?,
            buy_amount_crypto_base_unit: parse_base_units(response.buy_amount.as_deref().unwrap_or("0"), "buyAmount")?,
            sell_amount_before_fees_crypto_base_unit: parse_base_units(
                response.sell_amount.as_deref().unwrap_or("0"),
                "sellAmount",
            )?,
            minimum_crypto_human: min_max.minimum_amount_crypto_human,
            maximum_crypto_human: min_max.maximum_amount_crypto_human,
            allowance_contract: response.allowance_contract()?,
            account_number: input.account_number,
            sources: response.sources(),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        })
    }

    async fn build(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        require_sell_amount(input, "zrxBuildTrade")?;
        require_receive_address(input, "zrxBuildTrade")?;
        self.check_pair(&input.sell_asset, &input.buy_asset)?;

        let slippage = input.slippage.unwrap_or(DEFAULT_SLIPPAGE);
        let response = self
            .fetch(
                "/swap/v1/quote",
                &[
                    ("buyToken", Self::token(&input.buy_asset)),
                    ("sellToken", Self::token(&input.sell_asset)),
                    ("sellAmount", input.sell_amount_before_fees_crypto_base_unit.to_string()),
                    ("takerAddress", input.receive_address.clone()),
                    ("slippagePercentage", slippage.to_string()),
                    ("skipValidation", "true".to_string()),
                ],
            )
            .await?;

        let to: Address = response
            .to
            .as_deref()
            .ok_or_else(|| SwapError::new(SwapErrorType::ResponseError, "[zrxBuildTrade] quote has no target"))?
            .parse()
            .swap_err(SwapErrorType::ResponseError, "[zrxBuildTrade] invalid target address")?;
        let data: Bytes = response
            .data
            .as_deref()
            .unwrap_or("0x")
            .parse()
            .swap_err(SwapErrorType::ResponseError, "[zrxBuildTrade] invalid calldata")?;
        let value = parse_base_units(response.value.as_deref().unwrap_or("0"), "value")?;

        let quote = TradeQuote {
            rate: parse_decimal(&response.price, "price")?,
            fee_data: response.fee_data(&input.sell_asset)?,
            buy_amount_crypto_base_unit: parse_base_units(response.buy_amount.as_deref().unwrap_or("0"), "buyAmount")?,
            sell_amount_before_fees_crypto_base_unit: input.sell_amount_before_fees_crypto_base_unit,
            minimum_crypto_human: Decimal::ZERO,
            maximum_crypto_human: Decimal::ZERO,
            allowance_contract: response.allowance_contract()?,
            account_number: input.account_number,
            sources: response.sources(),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        };
        let payload = TradePayload::Zrx(ZrxTradePayload {
            to,
            data,
            value,
            gas: response.estimated_gas()?,
        });
        Ok(Trade::from_quote(quote, input.receive_address.clone(), input.receive_account_number, payload))
    }

    async fn execute(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        let TradePayload::Zrx(payload) = trade.payload else {
            return Err(SwapError::new(SwapErrorType::ValidationFailed, "[zrxExecuteTrade] not a 0x trade"));
        };
        let gas_price = trade
            .fee_data
            .gas_price()
            .ok_or_else(|| SwapError::new(SwapErrorType::ResponseError, "[zrxExecuteTrade] no gas price on trade"))?;

        let input = BuildSendTxInput {
            to: format!("{:#x}", payload.to),
            value: payload.value,
            account_number: trade.account_number,
            memo: None,
            kind: TxKind::EvmCall {
                data: payload.data,
                gas_limit: payload.gas,
                gas_price,
            },
        };
        let tx = self.adapter.build_send_transaction(&input, wallet).await?;
        let txid = sign_and_send(self.adapter.as_ref(), wallet, tx).await?;
        info!("🚀 0x trade {} -> {} sent: {}", trade.sell_asset.symbol, trade.buy_asset.symbol, txid);
        Ok(TradeResult::new(txid))
    }
}

#[async_trait]
impl Swapper for ZrxSwapper {
    fn name(&self) -> SwapperName {
        self.name
    }

    async fn get_trade_quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.quote(input)
            .await
            .swap_err(SwapErrorType::TradeQuoteFailed, "[zrxGetTradeQuote]")
    }

    async fn build_trade(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        self.build(input)
            .await
            .swap_err(SwapErrorType::BuildTradeFailed, "[zrxBuildTrade]")
    }

    async fn execute_trade(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        self.execute(trade, wallet)
            .await
            .swap_err(SwapErrorType::ExecuteTradeFailed, "[zrxExecuteTrade]")
    }

    async fn get_trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        Ok(TradeTxs {
            sell_txid: result.trade_id.clone(),
            buy_txid: result.trade_id.clone(),
        })
    }

    async fn get_usd_rate(&self, asset: &Asset) -> SwapResult<Decimal> {
        if asset.erc20_address() == Some(self.usdc) {
            return Ok(Decimal::ONE);
        }

        let buy_amount = U256::from(1000u64) * pow10_u256(self.usdc_precision);
        let response = self
            .fetch(
                "/swap/v1/price",
                &[
                    ("buyToken", format!("{:#x}", self.usdc)),
                    ("buyAmount", buy_amount.to_string()),
                    ("sellToken", Self::token(asset)),
                ],
            )
            .await?;
        // price is sell token per USDC
        let price = parse_decimal(&response.price, "price")?;
        let rate = Decimal::ONE.checked_div(price).unwrap_or(Decimal::ZERO);
        debug!("0x USD rate for {}: {}", asset.symbol, rate);
        validate_usd_rate(rate, asset, "0x")
    }

    async fn get_min_max(&self, sell_asset: &Asset) -> SwapResult<MinMax> {
        let usd_rate = self.get_usd_rate(sell_asset).await?;
        Ok(MinMax {
            minimum_amount_crypto_human: one_usd_minimum(usd_rate)?,
            maximum_amount_crypto_human: parse_decimal(MAX_ZRX_TRADE, "maximum")?,
        })
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
        if !self.supports(sell_asset_id) {
            return Vec::new();
        }
        asset_ids
            .iter()
            .filter(|id| *id != sell_asset_id && self.supports(id))
            .cloned()
            .collect()
    }

    fn filter_asset_ids_by_sellable(&self, asset_ids: &[AssetId]) -> Vec<AssetId> {
        asset_ids.iter().filter(|id| self.supports(id)).cloned().collect()
    }
}
