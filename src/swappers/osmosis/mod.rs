//! Osmosis venue: ATOM/OSMO through the GAMM pool, with IBC legs to and from
//! the Cosmos Hub

pub mod helpers;
pub mod state;

pub use helpers::*;
pub use state::*;

use alloy::primitives::U256;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use crate::{
    chain::{AdapterManager, ChainAdapter, FeeDataInput, Wallet},
    config::{PollConfig, MAX_OSMOSIS_TRADE},
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    network::VenueClient,
    swapper::{one_usd_minimum, require_receive_address, require_sell_amount, Swapper},
    types::{
        ApprovalNeeded, Asset, AssetId, BuildTradeInput, ChainId, GetTradeQuoteInput, MinMax, QuoteFeeData, SwapSource,
        SwapperName, Trade, TradePayload, TradeQuote, TradeResult, TradeTxs, ATOM_ASSET_ID, COSMOS_HUB_MAINNET,
        OSMOSIS_MAINNET, OSMO_ASSET_ID,
    },
    utils::ExactDecimal,
    validation::{parse_decimal, validate_usd_rate},
};

const SUPPORTED_ASSET_IDS: [&str; 2] = [ATOM_ASSET_ID, OSMO_ASSET_ID];

fn symbol_of(asset_id: &AssetId) -> Option<&'static str> {
    match asset_id.as_str() {
        ATOM_ASSET_ID => Some("ATOM"),
        OSMO_ASSET_ID => Some("OSMO"),
        _ => None,
    }
}

pub struct OsmosisSwapper {
    adapters: AdapterManager,
    client: VenueClient,
    osmo_url: String,
    cosmos_url: String,
    poll: PollConfig,
    settle_delay: Duration,
}

impl OsmosisSwapper {
    pub fn new(
        adapters: AdapterManager,
        osmo_url: &str,
        cosmos_url: &str,
        poll: PollConfig,
        settle_delay: Duration,
        timeout: Duration,
    ) -> SwapResult<Self> {
        Ok(Self {
            adapters,
            client: VenueClient::new("Osmosis", timeout)?,
            osmo_url: osmo_url.trim_end_matches('/').to_string(),
            cosmos_url: cosmos_url.trim_end_matches('/').to_string(),
            poll,
            settle_delay,
        })
    }

    fn osmosis_adapter(&self) -> SwapResult<std::sync::Arc<dyn ChainAdapter>> {
        self.adapters.require(&ChainId::from_raw(OSMOSIS_MAINNET))
    }

    fn cosmos_adapter(&self) -> SwapResult<std::sync::Arc<dyn ChainAdapter>> {
        self.adapters.require(&ChainId::from_raw(COSMOS_HUB_MAINNET))
    }

    fn check_pair(sell: &Asset, buy: &Asset) -> SwapResult<(&'static str, &'static str)> {
        match (symbol_of(&sell.asset_id), symbol_of(&buy.asset_id)) {
            (Some(sell_symbol), Some(buy_symbol)) if sell_symbol != buy_symbol => Ok((sell_symbol, buy_symbol)),
            _ => Err(SwapError::new(
                SwapErrorType::UnsupportedPair,
                format!("[Osmosis] unsupported pair {} -> {}", sell.asset_id, buy.asset_id),
            )
            .with_details(serde_json::json!({
                "sellAssetId": sell.asset_id.as_str(),
                "buyAssetId": buy.asset_id.as_str(),
            }))),
        }
    }

    /// OSMO is priced directly against USDC, ATOM hops through OSMO.
    async fn usd_rate(&self, asset: &Asset) -> SwapResult<Decimal> {
        let symbol = symbol_of(&asset.asset_id).ok_or_else(|| {
            SwapError::new(SwapErrorType::UnsupportedPair, format!("[Osmosis] no USD price for {}", asset.asset_id))
        })?;
        let one = U256::from(1u64);
        let osmo_usd = get_rate_info(&self.client, &self.osmo_url, "OSMO", "USDC", one).await?.rate;
        let rate = if symbol == "OSMO" {
            osmo_usd
        } else {
            get_rate_info(&self.client, &self.osmo_url, symbol, "OSMO", one).await?.rate * osmo_usd
        };
        validate_usd_rate(rate, asset, "Osmosis")
    }

    async fn min_max(&self, asset: &Asset) -> SwapResult<MinMax> {
        Ok(MinMax {
            minimum_amount_crypto_human: one_usd_minimum(self.usd_rate(asset).await?)?,
            maximum_amount_crypto_human: parse_decimal(MAX_OSMOSIS_TRADE, "maximum")?,
        })
    }

    async fn quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        let (sell_symbol, buy_symbol) = Self::check_pair(&input.sell_asset, &input.buy_asset)?;
        let sell_amount = input.sell_amount_before_fees_crypto_base_unit;
        let rate_amount = if sell_amount.is_zero() { U256::from(1u64) } else { sell_amount };

        let info = get_rate_info(&self.client, &self.osmo_url, sell_symbol, buy_symbol, rate_amount).await?;
        let min_max = self.min_max(&input.sell_asset).await?;
        let buy_usd = self.usd_rate(&input.buy_asset).await?;

        let adapter = self.osmosis_adapter()?;
        let estimate = adapter
            .get_fee_data(&FeeDataInput {
                to: String::new(),
                value: sell_amount,
                from: None,
                data: None,
            })
            .await?;
        let mut fee_data = QuoteFeeData::network_only(estimate.fast.tx_fee);
        if !sell_amount.is_zero() {
            fee_data.buy_asset_trade_fee_usd = ExactDecimal::from_base_units_times(
                info.buy_asset_trade_fee_crypto_base_unit,
                input.buy_asset.precision,
                buy_usd,
            )?;
        }

        Ok(TradeQuote {
            rate: info.rate,
            fee_data,
            sell_amount_before_fees_crypto_base_unit: sell_amount,
            buy_amount_crypto_base_unit: if sell_amount.is_zero() { U256::ZERO } else { info.buy_amount_crypto_base_unit },
            minimum_crypto_human: min_max.minimum_amount_crypto_human,
            maximum_crypto_human: min_max.maximum_amount_crypto_human,
            allowance_contract: None,
            account_number: input.account_number,
            sources: SwapSource::whole(SwapperName::Osmosis.to_string()),
            sell_asset: input.sell_asset.clone(),
            buy_asset: input.buy_asset.clone(),
        })
    }

    async fn build(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        require_sell_amount(input, "osmosisBuildTrade")?;
        require_receive_address(input, "osmosisBuildTrade")?;
        let quote = self.quote(&input.quote_input()).await?;
        Ok(Trade::from_quote(
            quote,
            input.receive_address.clone(),
            input.receive_account_number,
            TradePayload::Osmosis,
        ))
    }

    async fn execute(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        if trade.payload != TradePayload::Osmosis {
            return Err(SwapError::new(SwapErrorType::ValidationFailed, "[osmosisExecuteTrade] not an Osmosis trade"));
        }
        let receive_account_number = trade.receive_account_number.ok_or_else(|| {
            SwapError::new(
                SwapErrorType::ReceiveAccountNumberNotProvided,
                "[osmosisExecuteTrade] receive account number required for IBC legs",
            )
        })?;
        Self::check_pair(&trade.sell_asset, &trade.buy_asset)?;
        let from_osmo = trade.sell_asset.asset_id.as_str() == OSMO_ASSET_ID;
        let (sell_denom, buy_denom) = if from_osmo { (OSMO_DENOM, ATOM_DENOM) } else { (ATOM_DENOM, OSMO_DENOM) };

        let osmosis = self.osmosis_adapter()?;
        let cosmos = self.cosmos_adapter()?;
        let ctx = FlowContext {
            osmosis: osmosis.as_ref(),
            cosmos: cosmos.as_ref(),
            wallet,
            client: &self.client,
            osmo_url: &self.osmo_url,
            cosmos_url: &self.cosmos_url,
            poll: &self.poll,
            settle_delay: self.settle_delay,
        };
        let leg = TradeLeg {
            from_osmo,
            sell_denom,
            buy_denom,
            sell_amount: trade.sell_amount_before_fees_crypto_base_unit,
            account_number: trade.account_number,
            receive_account_number,
            receive_address: trade.receive_address,
        };
        OsmosisTradeFlow::new(ctx, leg).run().await
    }

    async fn trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        let Some(cosmos_address) = &result.cosmos_address else {
            return Ok(TradeTxs {
                sell_txid: result.previous_cosmos_txid.clone().unwrap_or_default(),
                buy_txid: result.trade_id.clone(),
            });
        };

        let history = self.cosmos_adapter()?.get_tx_history(cosmos_address).await?;
        let buy_txid = match history.first() {
            Some(latest) if Some(&latest.txid) != result.previous_cosmos_txid.as_ref() => latest.txid.clone(),
            _ => String::new(),
        };
        Ok(TradeTxs {
            sell_txid: result.trade_id.clone(),
            buy_txid,
        })
    }

    fn supports(asset_id: &AssetId) -> bool {
        SUPPORTED_ASSET_IDS.contains(&asset_id.as_str())
    }
}

#[async_trait]
impl Swapper for OsmosisSwapper {
    fn name(&self) -> SwapperName {
        SwapperName::Osmosis
    }

    async fn get_trade_quote(&self, input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.quote(input)
            .await
            .swap_err(SwapErrorType::TradeQuoteFailed, "[osmosisGetTradeQuote]")
    }

    async fn build_trade(&self, input: &BuildTradeInput) -> SwapResult<Trade> {
        self.build(input)
            .await
            .swap_err(SwapErrorType::BuildTradeFailed, "[osmosisBuildTrade]")
    }

    async fn execute_trade(&self, trade: Trade, wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        self.execute(trade, wallet)
            .await
            .swap_err(SwapErrorType::ExecuteTradeFailed, "[osmosisExecuteTrade]")
    }

    async fn get_trade_txs(&self, result: &TradeResult) -> SwapResult<TradeTxs> {
        self.trade_txs(result)
            .await
            .swap_err(SwapErrorType::GetTradeTxsFailed, "[osmosisGetTradeTxs]")
    }

    async fn get_usd_rate(&self, asset: &Asset) -> SwapResult<Decimal> {
        self.usd_rate(asset).await
    }

    async fn get_min_max(&self, sell_asset: &Asset) -> SwapResult<MinMax> {
        self.min_max(sell_asset).await
    }

    async fn approval_needed(&self, _quote: &TradeQuote, _wallet: &dyn Wallet) -> SwapResult<ApprovalNeeded> {
        Ok(ApprovalNeeded { approval_needed: false })
    }

    async fn approve_infinite(&self, _quote: &TradeQuote, _wallet: &dyn Wallet) -> SwapResult<String> {
        Err(SwapError::new(SwapErrorType::ResponseError, "[osmosisApproveInfinite] Osmosis has no allowances"))
    }

    async fn approve_amount(
        &self,
        _quote: &TradeQuote,
        _wallet: &dyn Wallet,
        _amount: Option<U256>,
    ) -> SwapResult<String> {
        Err(SwapError::new(SwapErrorType::ResponseError, "[osmosisApproveAmount] Osmosis has no allowances"))
    }

    fn filter_buy_assets_by_sell_asset_id(&self, sell_asset_id: &AssetId, asset_ids: &[AssetId]) -> Vec<AssetId> {
        if !Self::supports(sell_asset_id) {
            return Vec::new();
        }
        asset_ids
            .iter()
            .filter(|id| *id != sell_asset_id && Self::supports(id))
            .cloned()
            .collect()
    }

    fn filter_asset_ids_by_sellable(&self, asset_ids: &[AssetId]) -> Vec<AssetId> {
        asset_ids.iter().filter(|id| Self::supports(id)).cloned().collect()
    }
}
