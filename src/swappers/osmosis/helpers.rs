//! Osmosis LCD access: GAMM pool pricing, tx status and IBC channel balances

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;
use crate::{
    config::PollConfig,
    errors::{SwapError, SwapErrorType, SwapResult},
    network::{poll_until, VenueClient},
    utils::{base_unit_to_decimal, decimal_to_base_unit, round_rate},
    validation::{parse_base_units, parse_decimal},
};

pub const ATOM_DENOM: &str = "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2";
pub const OSMO_DENOM: &str = "uosmo";
pub const USDC_DENOM: &str = "ibc/D189335C6E4A68B513C10AB227BF1C1D38C746766278BA3EEB4FB14124F1D858";
/// Denom of ATOM on the Cosmos Hub itself.
pub const UATOM_DENOM: &str = "uatom";

pub const ATOM_OSMO_POOL_ID: u64 = 1;
pub const OSMO_USDC_POOL_ID: u64 = 678;

pub const IBC_TRANSFER_PORT: &str = "transfer";
pub const COSMO_OSMO_CHANNEL: &str = "channel-141";
pub const OSMO_COSMO_CHANNEL: &str = "channel-0";

/// ATOM, OSMO and USDC all use 6 decimals.
pub const OSMOSIS_PRECISION: u32 = 6;

pub fn symbol_denom(symbol: &str) -> Option<&'static str> {
    match symbol {
        "ATOM" => Some(ATOM_DENOM),
        "OSMO" => Some(OSMO_DENOM),
        "USDC" => Some(USDC_DENOM),
        _ => None,
    }
}

fn pool_for(sell_denom: &str, buy_denom: &str) -> Option<u64> {
    match (sell_denom, buy_denom) {
        (ATOM_DENOM, OSMO_DENOM) | (OSMO_DENOM, ATOM_DENOM) => Some(ATOM_OSMO_POOL_ID),
        (OSMO_DENOM, USDC_DENOM) | (USDC_DENOM, OSMO_DENOM) => Some(OSMO_USDC_POOL_ID),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PoolToken {
    denom: String,
    amount: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolAsset {
    token: PoolToken,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolParams {
    swap_fee: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Pool {
    pool_params: PoolParams,
    pool_assets: Vec<PoolAsset>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolResponse {
    pool: Pool,
}

impl Pool {
    fn balance(&self, denom: &str) -> SwapResult<U256> {
        let asset = self
            .pool_assets
            .iter()
            .find(|a| a.token.denom == denom)
            .ok_or_else(|| SwapError::new(SwapErrorType::PoolNotFound, format!("pool has no {} side", denom)))?;
        parse_base_units(&asset.token.amount, "pool_assets.token.amount")
    }
}

/// Spot rate and constant product output of one swap.
#[derive(Debug, Clone, PartialEq)]
pub struct RateInfo {
    pub rate: Decimal,
    pub buy_amount_crypto_base_unit: U256,
    /// Swap fee taken from the output, in buy asset base units.
    pub buy_asset_trade_fee_crypto_base_unit: U256,
}

/// Prices `sell_amount` of `sell_symbol` against the GAMM pool that pairs it
/// with `buy_symbol`.
pub async fn get_rate_info(
    client: &VenueClient,
    osmo_url: &str,
    sell_symbol: &str,
    buy_symbol: &str,
    sell_amount: U256,
) -> SwapResult<RateInfo> {
    let unsupported = || {
        SwapError::new(
            SwapErrorType::UnsupportedPair,
            format!("no Osmosis pool for {} -> {}", sell_symbol, buy_symbol),
        )
    };
    let sell_denom = symbol_denom(sell_symbol).ok_or_else(unsupported)?;
    let buy_denom = symbol_denom(buy_symbol).ok_or_else(unsupported)?;
    let pool_id = pool_for(sell_denom, buy_denom).ok_or_else(unsupported)?;

    let response: PoolResponse = client
        .get_json(&format!("{}/osmosis/gamm/v1beta1/pools/{}", osmo_url, pool_id), &[])
        .await?;
    let pool = response.pool;
    let swap_fee = parse_decimal(&pool.pool_params.swap_fee, "swap_fee")?;
    let sell_pool = base_unit_to_decimal(pool.balance(sell_denom)?, 0)?;
    let buy_pool = base_unit_to_decimal(pool.balance(buy_denom)?, 0)?;

    let rate = buy_pool
        .checked_div(sell_pool)
        .map(round_rate)
        .ok_or_else(|| SwapError::new(SwapErrorType::PoolNotFound, format!("pool {} is empty", pool_id)))?;

    let x = base_unit_to_decimal(sell_amount, 0)?;
    let gross = x * buy_pool / (sell_pool + x);
    let buy_amount = (gross * (Decimal::ONE - swap_fee)).floor();
    let fee = (gross * swap_fee).floor();
    debug!("Osmosis pool {} {} -> {}: rate {}, fee {}", pool_id, sell_symbol, buy_symbol, rate, swap_fee);

    Ok(RateInfo {
        rate,
        buy_amount_crypto_base_unit: decimal_to_base_unit(buy_amount, 0)?,
        buy_asset_trade_fee_crypto_base_unit: decimal_to_base_unit(fee, 0)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
struct TxResponse {
    code: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GetTxResponse {
    tx_response: TxResponse,
}

/// One status read of `txid`; `None` while the node does not know it yet.
pub async fn get_tx_status(client: &VenueClient, url: &str, txid: &str) -> SwapResult<Option<TxStatus>> {
    let response = client
        .get_raw(&format!("{}/cosmos/tx/v1beta1/txs/{}", url, txid), &[])
        .await?;
    if response.status == 404 {
        return Ok(None);
    }
    let tx: GetTxResponse = response.checked(client.venue())?.json(client.venue())?;
    Ok(Some(if tx.tx_response.code == 0 { TxStatus::Success } else { TxStatus::Failed }))
}

/// Polls until `txid` lands, then reports whether it succeeded.
pub async fn poll_for_complete(client: &VenueClient, url: &str, txid: &str, poll: &PollConfig) -> SwapResult<TxStatus> {
    poll_until(
        move || get_tx_status(client, url, txid),
        poll,
        &format!("cosmos tx {}", txid),
    )
    .await
}

#[derive(Debug, Clone, Deserialize)]
struct Balance {
    denom: String,
    amount: String,
}

#[derive(Debug, Clone, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<Balance>,
}

/// ATOM held on Osmosis by `address`, once non-zero.
pub async fn poll_for_atom_channel_balance(
    client: &VenueClient,
    osmo_url: &str,
    address: &str,
    poll: &PollConfig,
) -> SwapResult<U256> {
    let read = move || async move {
        let response: BalancesResponse = client
            .get_json(&format!("{}/cosmos/bank/v1beta1/balances/{}", osmo_url, address), &[])
            .await?;
        let amount = match response.balances.iter().find(|b| b.denom == ATOM_DENOM) {
            Some(balance) => parse_base_units(&balance.amount, "balances.amount")?,
            None => U256::ZERO,
        };
        Ok::<_, SwapError>((!amount.is_zero()).then_some(amount))
    };
    poll_until(read, poll, &format!("ATOM channel balance of {}", address)).await
}
