//! THORChain venue: native asset swaps through RUNE pools

pub mod execution;
pub mod pools;
pub mod rate;

pub use execution::*;
pub use pools::*;
pub use rate::*;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use crate::{
    allowance::{approval_fee, approve_amount, approve_infinite, evm_approval_needed},
    chain::{sign_and_send, AdapterManager, BuildSendTxInput, ChainAdapter, FeeDataInput, TxKind, Wallet},
    config::{DEFAULT_SLIPPAGE, MAX_THORCHAIN_TRADE},
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    network::VenueClient,
    swapper::{one_usd_minimum, require_receive_address, require_sell_amount, Swapper},
    types::{
        usdc, ApprovalNeeded, Asset, AssetId, BuildTradeInput, ChainNamespace, EvmFeeData, GetTradeQuoteInput,
        MinMax, QuoteFeeData, SwapSource, SwapperName, ThorchainTradePayload, Trade, TradePayload, TradeQuote,
        TradeResult, TradeTxs,
    },
    utils::{base_unit_to_decimal, decimal_to_base_unit},
    validation::{parse_decimal, validate_usd_rate},
};

pub struct ThorchainSwapper {
    adapters: AdapterManager,
    client: VenueClient,
    daemon_url: String,
    midgard_url: String,
    pools: RwLock<Arc<PoolGraph>>,
}

impl ThorchainSwapper {
    pub fn new(adapters: AdapterManager, daemon_url: &str, midgard_url: &str, timeout: Duration) -> SwapResult<Self> {
        Ok(Self {
            adapters,
            client: VenueClient::new("THORChain", timeout)?,
            daemon_url: daemon_url.trim_end_matches('/').to_string(),
            midgard_url: midgard_url.trim_end_matches('/').to_string(),
            pools: RwLock::new(Arc::new(PoolGraph::default())),
        })
    }

    /// Snapshot of the pool graph; the lock is not held past this call.
    pub async fn pool_graph(&self) -> Arc<PoolGraph> {
        self.pools.read().await.clone()
    }

    fn is_evm(asset: &Asset) -> bool {
        matches!(asset.chain_id.namespace(), Ok(ChainNamespace::Evm))
    }

    fn supports(graph: &PoolGraph, asset_id: &AssetId) -> bool {
        !is_rune(asset_id) && graph.supports(asset_id)
    }

    fn check_pair(&self, graph: &PoolGraph, sell: &Asset, buy: &Asset) -> SwapResult<()> {
        for asset in [sell, buy] {
            if !Self::supports(graph, &asset.asset_id) {
                return Err(SwapError::new(
                    SwapErrorType::UnsupportedPair,
                    format!("[THORChain] no pool for {}", asset.asset_id),
                )
                .with_details(serde_json::json!({
                    "sellAssetId": sell.asset_id.as_str(),
                    "buyAssetId": buy.asset_id.as_str(),
                })));
            }
        }
        Ok(())
    }

    fn usd_rate(graph: &PoolGraph, asset: &Asset) -> SwapResult<Decimal> {
        let asset_price = graph.price_in_rune(&asset.asset_id)?;
        let usd_price = graph.price_in_rune(&usdc().asset_id)?;
        let rate = asset_price
            .checked_div(usd_price)
            .ok_or_else(|| SwapError::new(SwapErrorType::PoolNotFound, "USDC pool has no price"))?;
        validate_usd_rate(rate, asset, "THORChain")
    }

    fn min_max(graph: &PoolGraph, asset: &Asset) -> SwapResult<MinMax> {
        Ok(MinMax {
            minimum_amount_crypto_human: one_usd_minimum(Self::usd_rate(graph, asset)?)?,
            maximum_amount_crypto_human: parse_decimal(MAX_THORCHAIN_TRADE, "maximum")?,
        })
    }

    async fn fee_data(
        &self,
        adapter: &dyn ChainAdapter,
        sell_asset: &Asset,
        deposit_to: &str,
        sell_amount: U256,
    ) -> SwapResult<QuoteFeeData> {
        let value = if sell_asset.erc20_address().is_some() { U256::ZERO } else { sell_amount };
        let estimate = adapter
            .get_fee_data(&FeeDataInput {
                to: deposit_to.to_string(),
                value,
                from: None,
                data: None,
            })
            .await?;
        let fast = estimate.fast;

        let mut fee_data = QuoteFeeData::network_only(fast.tx_fee);
        if let (true, Some(gas_limit), Some(gas_price)) = (Self::is_evm(sell_asset), fast.gas_limit, fast.gas_price) {
            fee_data.chain_specific = Some(EvmFeeData {
                estimated_gas_crypto_base_unit: gas_limit,
                gas_price_crypto_base_unit: gas_price,
                approval_fee_crypto_base_unit: sell_asset.asset_id.is_erc20().then(|| approval_fee(gas_price)),
            });
        }
        Ok(fee_data)
    }

    async fn quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        let graph = self.pool_graph().await;
        self.check_pair(&graph, &input.sell_asset, &input.buy_asset)?;
        let adapter = self.adapters.require(&input.sell_asset.chain_id)?;

        let receive_address = input.receive_address.clone().unwrap_or_default();
        let rate = match get_trade_rate(
            &self.client,
            &self.daemon_url,
            &graph,
            &input.sell_asset,
            &input.buy_asset.asset_id,
            input.sell_amount_before_fees_crypto_base_unit,
            &receive_address,
        )
        .await
        {
            Ok(rate) => rate,
            Err(e) if e.is(SwapErrorType::TradeBelowMinimum) => {
                debug!("THORChain quote below minimum, using pool price ratio: {}", e);
                get_price_ratio(&graph, &input.sell_asset.asset_id, &input.buy_asset.asset_id)?
            }
            Err(e) => return Err(e),
        };

        let min_max = Self::min_max(&graph, &input.sell_asset)?;
        let sell_amount = base_unit_to_decimal(
            input.sell_amount_before_fees_crypto_base_unit,
            input.sell_asset.precision,
        )?;
        let buy_amount = decimal_to_base_unit(sell_amount * rate, input.buy_asset.precision)?;

        let sell_pool_id = graph.pool_id(&input.sell_asset.asset_id)?;

        let inbound = get_inbound_address(&self.client, &self.daemon_url, &sell_pool_id).await?;
        let (deposit_to, allowance_contract) = if Self::is_evm(&input.sell_asset) {
            let router = inbound.router_address()?;
            (format!("{:#x}", router), Some(router))
        } else {
            (inbound.address.clone(), None)
        };
        let fee_data = self
            .fee_data(
                adapter.as_ref(),
                &input.sell_asset,
                &deposit_to,
                input.sell_amount_before_fees_crypto_base_unit,
            )
            .await?;

        Ok(TradeQuote {
            rate,
            fee_data,
            sell_amount_before_fees_crypto_base_unit: input.sell_amount_before_fees_crypto_base_unit,
            buy_amount_crypto_base_unit: buy_amount,
            minimum_crypto_human: min_max.minimum_amount_crypto_human,
            maximum_crypto_human: min_max.maximum_amount_crypto_human,
            allowance_contract,
            account_number: input.account_number,
            sources: SwapSource::whole(SwapperName::Thorchain.to_string()),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        })
    }

    async fn build(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        require_sell_amount(input, "thorBuildTrade")?;
        require_receive_address(input, "thorBuildTrade")?;

        let quote = self.quote(&input.quote_input()).await?;
        let sell_amount = input.sell_amount_before_fees_crypto_base_unit;

        let (sell_pool_id, memo) = {
            let graph = self.pool_graph().await;
            let sell_pool_id = graph.pool_id(&input.sell_asset.asset_id)?;
            let buy_pool_id = graph.pool_id(&input.buy_asset.asset_id)?;
            let slippage = input.slippage.unwrap_or(DEFAULT_SLIPPAGE);
            let limit = get_limit(&graph, &input.sell_asset, &input.buy_asset.asset_id, sell_amount, slippage)?;
            (sell_pool_id, make_swap_memo(&buy_pool_id, &input.receive_address, limit))
        };

        let inbound = get_inbound_address(&self.client, &self.daemon_url, &sell_pool_id).await?;
        let payload = if Self::is_evm(&input.sell_asset) {
            let vault: Address = inbound
                .address
                .parse()
                .swap_err(SwapErrorType::ResponseError, "[thorBuildTrade] invalid inbound vault address")?;
            let token = input.sell_asset.erc20_address();
            ThorchainTradePayload::Evm {
                router: inbound.router_address()?,
                data: encode_deposit_with_expiry(vault, token, sell_amount, &memo, deposit_expiry()),
                value: if token.is_none() { sell_amount } else { U256::ZERO },
            }
        } else {
            ThorchainTradePayload::Memo {
                inbound_address: inbound.address,
                memo,
                amount_crypto_base_unit: sell_amount,
            }
        };

        Ok(Trade::from_quote(
            quote,
            input.receive_address.clone(),
            input.receive_account_number,
            TradePayload::Thorchain(payload),
        ))
    }

    async fn execute(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        let TradePayload::Thorchain(payload) = trade.payload else {
            return Err(SwapError::new(SwapErrorType::ValidationFailed, "[thorExecuteTrade] not a THORChain trade"));
        };
        let adapter = self.adapters.require(&trade.sell_asset.chain_id)?;

        let input = match payload {
            ThorchainTradePayload::Evm { router, data, value } => {
                let chain_specific = trade.fee_data.chain_specific.as_ref().ok_or_else(|| {
                    SwapError::new(SwapErrorType::ResponseError, "[thorExecuteTrade] no gas estimate on trade")
                })?;
                BuildSendTxInput {
                    to: format!("{:#x}", router),
                    value,
                    account_number: trade.account_number,
                    memo: None,
                    kind: TxKind::EvmCall {
                        data,
                        gas_limit: chain_specific.estimated_gas_crypto_base_unit,
                        gas_price: chain_specific.gas_price_crypto_base_unit,
                    },
                }
            }
            ThorchainTradePayload::Memo { inbound_address, memo, amount_crypto_base_unit } => BuildSendTxInput {
                to: inbound_address,
                value: amount_crypto_base_unit,
                account_number: trade.account_number,
                memo: Some(memo),
                kind: TxKind::Send,
            },
        };

        let tx = adapter.build_send_transaction(&input, wallet).await?;
        let txid = sign_and_send(adapter.as_ref(), wallet, tx).await?;
        info!("⚡ THORChain deposit {} -> {} sent: {}", trade.sell_asset.symbol, trade.buy_asset.symbol, txid);
        Ok(TradeResult::new(txid))
    }
}

#[async_trait]
impl Swapper for ThorchainSwapper {
    fn name(&self) -> SwapperName {
        SwapperName::Thorchain
    }

    async fn initialize(&self) -> SwapResult<()> {
        let pools: Vec<ThornodePool> = self
            .client
            .get_json(&format!("{}/lcd/thorchain/pools", self.daemon_url), &[])
            .await?;
        let graph = PoolGraph::new(pools);
        info!("🌊 Loaded {} THORChain pools", graph.len());
        *self.pools.write().await = Arc::new(graph);
        Ok(())
    }

    async fn get_trade_quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.quote(input)
            .await
            .swap_err(SwapErrorType::TradeQuoteFailed, "[thorGetTradeQuote]")
    }

    async fn build_trade(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        self.build(input)
            .await
            .swap_err(SwapErrorType::BuildTradeFailed, "[thorBuildTrade]")
    }

    async fn execute_trade(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        self.execute(trade, wallet)
            .await
            .swap_err(SwapErrorType::ExecuteTradeFailed, "[thorExecuteTrade]")
    }

    async fn get_trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        get_trade_txs(&self.client, &self.midgard_url, &result.trade_id)
            .await
            .swap_err(SwapErrorType::GetTradeTxsFailed, "[thorGetTradeTxs]")
    }

    async fn get_usd_rate(&self, asset: &Asset) -> SwapResult<Decimal> {
        Self::usd_rate(&*self.pool_graph().await, asset)
    }

    async fn get_min_max(&self, sell_asset: &Asset) -> SwapResult<MinMax> {
        Self::min_max(&*self.pool_graph().await, sell_asset)
    }

    async fn approval_needed(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<ApprovalNeeded> {
        if !Self::is_evm(&quote.sell_asset) {
            return Ok(ApprovalNeeded { approval_needed: false });
        }
        let adapter = self.adapters.require(&quote.sell_asset.chain_id)?;
        evm_approval_needed(adapter.as_ref(), wallet, quote).await
    }

    async fn approve_infinite(&self, quote: &TradeQuote, wallet: &dyn Wallet) -> SwapResult<String> {
        let adapter = self.adapters.require(&quote.sell_asset.chain_id)?;
        approve_infinite(adapter.as_ref(), wallet, quote).await
    }

    async fn approve_amount(&self, quote: &TradeQuote, wallet: &dyn Wallet, amount: Option<U256>) -> SwapResult<String> {
        let adapter = self.adapters.require(&quote.sell_asset.chain_id)?;
        approve_amount(adapter.as_ref(), wallet, quote, amount).await
    }

    fn filter_buy_assets_by_sell_asset_id(&self, sell_asset_id: &AssetId, asset_ids: &[AssetId]) -> Vec<AssetId> {
        let Ok(graph) = self.pools.try_read() else {
            return Vec::new();
        };
        if !Self::supports(&graph, sell_asset_id) {
            return Vec::new();
        }
        asset_ids
            .iter()
            .filter(|id| *id != sell_asset_id && Self::supports(&graph, id))
            .cloned()
            .collect()
    }

    fn filter_asset_ids_by_sellable(&self, asset_ids: &[AssetId]) -> Vec<AssetId> {
        let Ok(graph) = self.pools.try_read() else {
            return Vec::new();
        };
        asset_ids
            .iter()
            .filter(|id| Self::supports(&graph, id) && self.adapters.get(&id.chain_id()).is_some())
            .cloned()
            .collect()
    }
}
