//! LI.FI bridge and DEX aggregator across EVM chains
//!
//! One instance serves every EVM chain that both LI.FI and the adapter
//! manager know about. Chains and tokens are cached at `initialize`; token
//! prices from that cache back the USD rate and the one dollar minimum.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use crate::{
    allowance::{approval_fee, approve_amount, approve_infinite, evm_approval_needed},
    chain::{sign_and_send, AdapterManager, BuildSendTxInput, ChainAdapter, TxKind, Wallet},
    config::{DEFAULT_SLIPPAGE, MAX_LIFI_TRADE},
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    network::VenueClient,
    swapper::{one_usd_minimum, require_receive_address, require_sell_amount, Swapper},
    types::{
        ApprovalNeeded, Asset, AssetId, BuildTradeInput, ChainId, ChainNamespace, EvmFeeData, GetTradeQuoteInput,
        LifiTradePayload, MinMax, QuoteFeeData, SwapSource, SwapperName, Trade, TradePayload, TradeQuote,
        TradeResult, TradeTxs, NATIVE_TOKEN_PLACEHOLDER,
    },
    utils::{decimal_to_base_unit, rate_from_base_units, ExactDecimal},
    validation::{parse_base_units, parse_decimal, parse_quantity, validate_usd_rate},
};

#[derive(Debug, Clone, Deserialize)]
struct LifiChain {
    id: u64,
    key: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LifiChains {
    chains: Vec<LifiChain>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiToken {
    address: String,
    #[serde(default, rename = "priceUSD")]
    price_usd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LifiTokens {
    tokens: HashMap<String, Vec<LifiToken>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiFeeCost {
    #[serde(default, rename = "amountUSD")]
    amount_usd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiGasCost {
    #[serde(default)]
    estimate: Option<String>,
    #[serde(default)]
    limit: Option<String>,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiEstimate {
    from_amount: String,
    to_amount: String,
    #[serde(default)]
    approval_address: Option<String>,
    #[serde(default)]
    fee_costs: Vec<LifiFeeCost>,
    #[serde(default)]
    gas_costs: Vec<LifiGasCost>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiTransactionRequest {
    to: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas_limit: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LifiToolDetails {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiQuote {
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    tool_details: Option<LifiToolDetails>,
    estimate: LifiEstimate,
    #[serde(default)]
    transaction_request: Option<LifiTransactionRequest>,
}

impl LifiQuote {
    fn gas(&self) -> SwapResult<(U256, U256)> {
        let mut gas = U256::ZERO;
        let mut gas_price = U256::ZERO;
        for cost in &self.estimate.gas_costs {
            if let Some(units) = cost.estimate.as_deref().or(cost.limit.as_deref()) {
                gas += parse_base_units(units, "gasCosts.estimate")?;
            }
            if let Some(price) = cost.price.as_deref() {
                gas_price = gas_price.max(parse_base_units(price, "gasCosts.price")?);
            }
        }
        Ok((gas, gas_price))
    }

    fn fee_data(&self, sell_asset: &Asset) -> SwapResult<QuoteFeeData> {
        let (gas, gas_price) = self.gas()?;
        let mut fees_usd = Decimal::ZERO;
        for cost in &self.estimate.fee_costs {
            if let Some(amount) = cost.amount_usd.as_deref() {
                fees_usd = fees_usd
                    .checked_add(parse_decimal(amount, "feeCosts.amountUSD")?)
                    .ok_or_else(|| SwapError::new(SwapErrorType::ResponseError, "LI.FI fee costs overflow"))?;
            }
        }
        Ok(QuoteFeeData {
            network_fee_crypto_base_unit: gas * gas_price,
            sell_asset_trade_fee_usd: ExactDecimal::from_decimal(fees_usd)?,
            buy_asset_trade_fee_usd: ExactDecimal::ZERO,
            chain_specific: Some(EvmFeeData {
                estimated_gas_crypto_base_unit: gas,
                gas_price_crypto_base_unit: gas_price,
                approval_fee_crypto_base_unit: sell_asset.asset_id.is_erc20().then(|| approval_fee(gas_price)),
            }),
        })
    }

    fn allowance_contract(&self, sell_asset: &Asset) -> SwapResult<Option<Address>> {
        if !sell_asset.asset_id.is_erc20() {
            return Ok(None);
        }
        match self.estimate.approval_address.as_deref() {
            Some(target) => {
                let target: Address = target
                    .parse()
                    .swap_err(SwapErrorType::ResponseError, "invalid approvalAddress")?;
                Ok((!target.is_zero()).then_some(target))
            }
            None => Ok(None),
        }
    }

    fn sources(&self) -> Vec<SwapSource> {
        match (self.tool_details.as_ref(), self.tool.as_deref()) {
            (Some(details), _) => SwapSource::whole(details.name.clone()),
            (None, Some(tool)) => SwapSource::whole(tool),
            (None, None) => SwapSource::whole(SwapperName::Lifi.to_string()),
        }
    }

    fn rate(&self, sell_asset: &Asset, buy_asset: &Asset) -> SwapResult<Decimal> {
        rate_from_base_units(
            parse_base_units(&self.estimate.to_amount, "toAmount")?,
            buy_asset.precision,
            parse_base_units(&self.estimate.from_amount, "fromAmount")?,
            sell_asset.precision,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifiTxHash {
    #[serde(default)]
    tx_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LifiStatus {
    status: String,
    #[serde(default)]
    sending: Option<LifiTxHash>,
    #[serde(default)]
    receiving: Option<LifiTxHash>,
}

/// Chain keys and token prices LI.FI serves for our chains.
#[derive(Debug, Default)]
pub struct LifiCatalog {
    chains: HashMap<ChainId, String>,
    tokens: HashMap<AssetId, Decimal>,
}

impl LifiCatalog {
    pub fn chain_key(&self, chain_id: &ChainId) -> Option<&str> {
        self.chains.get(chain_id).map(String::as_str)
    }

    pub fn supports(&self, asset_id: &AssetId) -> bool {
        self.tokens.contains_key(asset_id)
    }

    pub fn price_usd(&self, asset_id: &AssetId) -> Option<Decimal> {
        self.tokens.get(asset_id).copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

pub struct LifiSwapper {
    adapters: AdapterManager,
    client: VenueClient,
    base_url: String,
    catalog: RwLock<Arc<LifiCatalog>>,
}

impl LifiSwapper {
    pub fn new(adapters: AdapterManager, base_url: &str, timeout: Duration) -> SwapResult<Self> {
        Ok(Self {
            adapters,
            client: VenueClient::new("LI.FI", timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            catalog: RwLock::new(Arc::new(LifiCatalog::default())),
        })
    }

    pub async fn catalog(&self) -> Arc<LifiCatalog> {
        self.catalog.read().await.clone()
    }

    async fn load_catalog(&self) -> SwapResult<LifiCatalog> {
        let listed: LifiChains = self
            .client
            .get_json(&format!("{}/v1/chains", self.base_url), &[])
            .await?;

        let mut catalog = LifiCatalog::default();
        for chain in listed.chains {
            let chain_id = ChainId::new("eip155", &chain.id.to_string());
            // chains we cannot sign on are left out
            if self.adapters.get(&chain_id).is_some() {
                catalog.chains.insert(chain_id, chain.key);
            }
        }
        if catalog.chains.is_empty() {
            return Ok(catalog);
        }

        let mut ids: Vec<u64> = catalog.chains.keys().filter_map(ChainId::evm_chain_id).collect();
        ids.sort_unstable();
        let ids = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        let listed: LifiTokens = self
            .client
            .get_json(&format!("{}/v1/tokens", self.base_url), &[("chains", ids)])
            .await?;

        for (chain, tokens) in listed.tokens {
            let chain_id = ChainId::new("eip155", &chain);
            let Some(adapter) = self.adapters.get(&chain_id) else {
                continue;
            };
            for token in tokens {
                let Ok(address) = token.address.parse::<Address>() else {
                    debug!("skipping LI.FI token with address {}", token.address);
                    continue;
                };
                let asset_id = if address.is_zero() || address == NATIVE_TOKEN_PLACEHOLDER {
                    adapter.fee_asset_id()
                } else {
                    AssetId::new(&chain_id, "erc20", &format!("{:#x}", address))
                };
                let price = token
                    .price_usd
                    .as_deref()
                    .and_then(|p| parse_decimal(p, "priceUSD").ok())
                    .unwrap_or(Decimal::ZERO);
                catalog.tokens.insert(asset_id, price);
            }
        }
        Ok(catalog)
    }

    fn check_pair<'a>(&self, catalog: &'a LifiCatalog, sell: &Asset, buy: &Asset) -> SwapResult<(&'a str, &'a str)> {
        for asset in [sell, buy] {
            if asset.chain_id.namespace().ok() != Some(ChainNamespace::Evm) {
                return Err(SwapError::new(
                    SwapErrorType::UnsupportedChain,
                    format!("[LI.FI] only EVM chains are supported, got {}", asset.chain_id),
                ));
            }
        }
        let keys = catalog.chain_key(&sell.chain_id).zip(catalog.chain_key(&buy.chain_id));
        match keys {
            Some(keys) if catalog.supports(&sell.asset_id) && catalog.supports(&buy.asset_id) => Ok(keys),
            _ => Err(SwapError::new(
                SwapErrorType::UnsupportedPair,
                format!("[LI.FI] unsupported pair {} -> {}", sell.asset_id, buy.asset_id),
            )
            .with_details(serde_json::json!({
                "sellAssetChainId": sell.chain_id.as_str(),
                "buyAssetChainId": buy.chain_id.as_str(),
            }))),
        }
    }

    fn sell_adapter(&self, sell_asset: &Asset) -> SwapResult<Arc<dyn ChainAdapter>> {
        self.adapters.require(&sell_asset.chain_id)
    }

    /// LI.FI takes token addresses, with the zero address for native assets.
    fn token(asset: &Asset) -> String {
        format!("{:#x}", asset.erc20_address().unwrap_or(Address::ZERO))
    }

    async fn fetch_quote(
        &self,
        keys: (&str, &str),
        sell: &Asset,
        buy: &Asset,
        amount: U256,
        from_address: &str,
        to_address: &str,
        slippage: Decimal,
    ) -> SwapResult<LifiQuote> {
        self.client
            .get_json(
                &format!("{}/v1/quote", self.base_url),
                &[
                    ("fromChain", keys.0.to_string()),
                    ("toChain", keys.1.to_string()),
                    ("fromToken", Self::token(sell)),
                    ("toToken", Self::token(buy)),
                    ("fromAmount", amount.to_string()),
                    ("fromAddress", from_address.to_string()),
                    ("toAddress", to_address.to_string()),
                    ("slippage", slippage.to_string()),
                ],
            )
            .await
    }

    fn usd_rate(catalog: &LifiCatalog, asset: &Asset) -> SwapResult<Decimal> {
        let rate = catalog.price_usd(&asset.asset_id).unwrap_or(Decimal::ZERO);
        debug!("LI.FI USD rate for {}: {}", asset.symbol, rate);
        validate_usd_rate(rate, asset, "LI.FI")
    }

    fn min_max(catalog: &LifiCatalog, sell_asset: &Asset) -> SwapResult<MinMax> {
        Ok(MinMax {
            minimum_amount_crypto_human: one_usd_minimum(Self::usd_rate(catalog, sell_asset)?)?,
            maximum_amount_crypto_human: parse_decimal(MAX_LIFI_TRADE, "maximum")?,
        })
    }

    async fn quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        let catalog = self.catalog().await;
        let keys = self.check_pair(&catalog, &input.sell_asset, &input.buy_asset)?;
        let min_max = Self::min_max(&catalog, &input.sell_asset)?;

        let sell_amount = if input.sell_amount_before_fees_crypto_base_unit.is_zero() {
            decimal_to_base_unit(min_max.minimum_amount_crypto_human, input.sell_asset.precision)?
        } else {
            input.sell_amount_before_fees_crypto_base_unit
        };
        let from_address = match input.receive_address.as_deref() {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => format!("{:#x}", Address::ZERO),
        };

        let response = self
            .fetch_quote(
                keys,
                &input.sell_asset,
                &input.buy_asset,
                sell_amount,
                &from_address,
                &from_address,
                DEFAULT_SLIPPAGE,
            )
            .await?;

        Ok(TradeQuote {
            rate: response.rate(&input.sell_asset, &input.buy_asset)?,
            fee_data: response.fee_data(&input.sell_asset)?,
            buy_amount_crypto_base_unit: parse_base_units(&response.estimate.to_amount, "toAmount")?,
            sell_amount_before_fees_crypto_base_unit: parse_base_units(&response.estimate.from_amount, "fromAmount")?,
            minimum_crypto_human: min_max.minimum_amount_crypto_human,
            maximum_crypto_human: min_max.maximum_amount_crypto_human,
            allowance_contract: response.allowance_contract(&input.sell_asset)?,
            account_number: input.account_number,
            sources: response.sources(),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        })
    }

    async fn build(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        require_sell_amount(input, "lifiBuildTrade")?;
        require_receive_address(input, "lifiBuildTrade")?;
        let catalog = self.catalog().await;
        let keys = self.check_pair(&catalog, &input.sell_asset, &input.buy_asset)?;

        let from_address = self
            .sell_adapter(&input.sell_asset)?
            .get_address(input.wallet.as_ref(), input.account_number)
            .await?;
        let response = self
            .fetch_quote(
                keys,
                &input.sell_asset,
                &input.buy_asset,
                input.sell_amount_before_fees_crypto_base_unit,
                &from_address,
                &input.receive_address,
                input.slippage.unwrap_or(DEFAULT_SLIPPAGE),
            )
            .await?;

        let request = response
            .transaction_request
            .as_ref()
            .ok_or_else(|| SwapError::new(SwapErrorType::ResponseError, "[lifiBuildTrade] quote has no transaction request"))?;
        let (gas, gas_price) = response.gas()?;
        let payload = LifiTradePayload {
            to: request
                .to
                .parse()
                .swap_err(SwapErrorType::ResponseError, "[lifiBuildTrade] invalid target address")?,
            data: request
                .data
                .as_deref()
                .unwrap_or("0x")
                .parse::<Bytes>()
                .swap_err(SwapErrorType::ResponseError, "[lifiBuildTrade] invalid calldata")?,
            value: parse_quantity(request.value.as_deref().unwrap_or("0x0"), "value")?,
            gas_limit: match request.gas_limit.as_deref() {
                Some(limit) => parse_quantity(limit, "gasLimit")?,
                None => gas,
            },
            gas_price: match request.gas_price.as_deref() {
                Some(price) => parse_quantity(price, "gasPrice")?,
                None => gas_price,
            },
        };

        let quote = TradeQuote {
            rate: response.rate(&input.sell_asset, &input.buy_asset)?,
            fee_data: response.fee_data(&input.sell_asset)?,
            buy_amount_crypto_base_unit: parse_base_units(&response.estimate.to_amount, "toAmount")?,
            sell_amount_before_fees_crypto_base_unit: input.sell_amount_before_fees_crypto_base_unit,
            minimum_crypto_human: Decimal::ZERO,
            maximum_crypto_human: Decimal::ZERO,
            allowance_contract: response.allowance_contract(&input.sell_asset)?,
            account_number: input.account_number,
            sources: response.sources(),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        };
        Ok(Trade::from_quote(
            quote,
            input.receive_address.clone(),
            input.receive_account_number,
            TradePayload::Lifi(payload),
        ))
    }

    async fn execute(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        let TradePayload::Lifi(payload) = trade.payload else {
            return Err(SwapError::new(SwapErrorType::ValidationFailed, "[lifiExecuteTrade] not a LI.FI trade"));
        };
        let adapter = self.sell_adapter(&trade.sell_asset)?;

        let input = BuildSendTxInput {
            to: format!("{:#x}", payload.to),
            value: payload.value,
            account_number: trade.account_number,
            memo: None,
            kind: TxKind::EvmCall {
                data: payload.data,
                gas_limit: payload.gas_limit,
                gas_price: payload.gas_price,
            },
        };
        let tx = adapter.build_send_transaction(&input, wallet).await?;
        let txid = sign_and_send(adapter.as_ref(), wallet, tx).await?;
        info!("🚀 LI.FI trade {} -> {} sent: {}", trade.sell_asset.symbol, trade.buy_asset.symbol, txid);
        Ok(TradeResult::new(txid))
    }

    async fn trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        let response = self
            .client
            .get_raw(&format!("{}/v1/status", self.base_url), &[("txHash", result.trade_id.clone())])
            .await?;
        // not indexed yet
        if response.status == 404 {
            return Ok(TradeTxs {
                sell_txid: result.trade_id.clone(),
                buy_txid: String::new(),
            });
        }
        let status: LifiStatus = response.checked(self.client.venue())?.json(self.client.venue())?;
        if status.status == "FAILED" {
            return Err(SwapError::new(SwapErrorType::GetTradeTxsFailed, "LI.FI reports the transfer failed")
                .with_details(serde_json::json!({ "txHash": result.trade_id })));
        }

        let sell_txid = status
            .sending
            .and_then(|s| s.tx_hash)
            .unwrap_or_else(|| result.trade_id.clone());
        let buy_txid = match status.status.as_str() {
            "DONE" => status.receiving.and_then(|r| r.tx_hash).unwrap_or_default(),
            _ => String::new(),
        };
        Ok(TradeTxs { sell_txid, buy_txid })
    }
}

#[async_trait]
impl Swapper for LifiSwapper {
    fn name(&self) -> SwapperName {
        SwapperName::Lifi
    }

    async fn initialize(&self) -> SwapResult<()> {
        let catalog = self
            .load_catalog()
            .await
            .swap_err(SwapErrorType::ResponseError, "[lifiInitialize]")?;
        info!("🌉 Loaded {} LI.FI tokens on {} chains", catalog.len(), catalog.chains.len());
        *self.catalog.write().await = Arc::new(catalog);
        Ok(())
    }

    async fn get_trade_quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.quote(input)
            .await
            .swap_err(SwapErrorType::TradeQuoteFailed, "[lifiGetTradeQuote]")
    }

    async fn build_trade(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        self.build(input)
            .await
            .swap_err(SwapErrorType::BuildTradeFailed, "[lifiBuildTrade]")
    }

    async fn execute_trade(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        self.execute(trade, wallet)
            .await
            .swap_err(SwapErrorType::ExecuteTradeFailed, "[lifiExecuteTrade]")
    }

    async fn get_trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        self.trade_txs(result)
            .await
            .swap_err(SwapErrorType::GetTradeTxsFailed, "[lifiGetTradeTxs]")
    }

    async fn get_usd_rate(&self, asset: &Asset) -> SwapResult<Decimal> {
        Self::usd_rate(&*self.catalog().await, asset)
    }

    async fn get_min_max(&self, sell_asset: &Asset) -> SwapResult<MinMax> {
        Self::min_max(&*self.catalog().await, sell_asset)
    }

    async fn approval_needed(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<ApprovalNeeded> {
        let adapter = self
            .sell_adapter(&quote.sell_asset)
            .swap_err(SwapErrorType::CheckApprovalFailed, "[lifiApprovalNeeded]")?;
        evm_approval_needed(adapter.as_ref(), wallet, quote).await
    }

    async fn approve_infinite(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<String> {
        let adapter = self.sell_adapter(&quote.sell_asset)?;
        approve_infinite(adapter.as_ref(), wallet, quote).await
    }

    async fn approve_amount(&self, quote: &TradeQuote, wallet: &dyn Wallet, amount: Option<U256>) -> SwapResult<String> {
        let adapter = self.sell_adapter(&quote.sell_asset)?;
        approve_amount(adapter.as_ref(), wallet, quote, amount).await
    }

    fn filter_buy_assets_by_sell_asset_id(&self, sell_asset_id: &AssetId, asset_ids: &[AssetId]) -> Vec<AssetId> {
        let Ok(catalog) = self.catalog.try_read() else {
            return Vec::new();
        };
        if !catalog.supports(sell_asset_id) {
            return Vec::new();
        }
        asset_ids
            .iter()
            .filter(|id| *id != sell_asset_id && catalog.supports(id))
            .cloned()
            .collect()
    }

    fn filter_asset_ids_by_sellable(&self, asset_ids: &[AssetId]) -> Vec<AssetId> {
        let Ok(catalog) = self.catalog.try_read() else {
            return Vec::new();
        };
        asset_ids.iter().filter(|id| catalog.supports(id)).cloned().collect()
    }
}
