//! THORChain deposits: inbound vault lookup, swap memo, router calldata and
//! midgard settlement lookup

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use super::pools::pool_chain;
use crate::{
    config::THORCHAIN_DEPOSIT_EXPIRY_SECS,
    errors::{SwapError, SwapErrorType, SwapResult},
    network::VenueClient,
    types::TradeTxs,
};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IThorchainRouter {
        function depositWithExpiry(address vault, address asset, uint256 amount, string memo, uint256 expiration) external payable;
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundAddress {
    pub chain: String,
    pub address: String,
    #[serde(default)]
    pub router: Option<String>,
    #[serde(default)]
    pub halted: bool,
    #[serde(default)]
    pub chain_trading_paused: bool,
    #[serde(default)]
    pub global_trading_paused: bool,
}

impl InboundAddress {
    pub fn is_trading(&self) -> bool {
        !(self.halted || self.chain_trading_paused || self.global_trading_paused)
    }

    pub fn router_address(&self) -> SwapResult<Address> {
        self.router
            .as_deref()
            .and_then(|r| r.parse().ok())
            .ok_or_else(|| {
                SwapError::new(
                    SwapErrorType::ResponseError,
                    format!("no router for THORChain inbound chain {}", self.chain),
                )
            })
    }
}

/// Inbound vault for the chain of `pool_id`. Fails closed: a halted or
/// paused chain, or one missing from the list, cannot be traded.
pub async fn get_inbound_address(client: &VenueClient, daemon_url: &str, pool_id: &str) -> SwapResult<InboundAddress> {
    let chain = pool_chain(pool_id);
    let inbound: Vec<InboundAddress> = client
        .get_json(&format!("{}/lcd/thorchain/inbound_addresses", daemon_url), &[])
        .await?;

    let entry = inbound
        .into_iter()
        .find(|i| i.chain.eq_ignore_ascii_case(chain))
        .ok_or_else(|| {
            SwapError::new(
                SwapErrorType::ResponseError,
                format!("no THORChain inbound address for {}", chain),
            )
            .with_details(serde_json::json!({ "chain": chain }))
        })?;

    if !entry.is_trading() {
        warn!("⚠️ THORChain inbound {} is halted or paused", chain);
        return Err(SwapError::new(
            SwapErrorType::ResponseError,
            format!("THORChain trading is halted for {}", chain),
        )
        .with_details(serde_json::json!({
            "chain": chain,
            "halted": entry.halted,
            "chainTradingPaused": entry.chain_trading_paused,
            "globalTradingPaused": entry.global_trading_paused,
        })));
    }
    Ok(entry)
}

/// `s:<buy pool>:<destination>:<limit>`
pub fn make_swap_memo(buy_pool_id: &str, destination: &str, limit: U256) -> String {
    format!("s:{}:{}:{}", buy_pool_id, destination, limit)
}

pub fn deposit_expiry() -> U256 {
    U256::from((Utc::now().timestamp() + THORCHAIN_DEPOSIT_EXPIRY_SECS).max(0) as u64)
}

/// Router calldata for an EVM deposit. Native ETH is deposited as the zero
/// asset address.
pub fn encode_deposit_with_expiry(
    vault: Address,
    asset: Option<Address>,
    amount: U256,
    memo: &str,
    expiration: U256,
) -> Bytes {
    IThorchainRouter::depositWithExpiryCall {
        vault,
        asset: asset.unwrap_or(Address::ZERO),
        amount,
        memo: memo.to_string(),
        expiration,
    }
    .abi_encode()
    .into()
}

#[derive(Debug, Clone, Deserialize)]
struct MidgardCoin {
    asset: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MidgardTx {
    #[serde(rename = "txID")]
    tx_id: String,
    #[serde(default)]
    coins: Vec<MidgardCoin>,
}

#[derive(Debug, Clone, Deserialize)]
struct MidgardAction {
    status: String,
    #[serde(default)]
    out: Vec<MidgardTx>,
}

#[derive(Debug, Clone, Deserialize)]
struct MidgardActions {
    #[serde(default)]
    actions: Vec<MidgardAction>,
}

/// Outbound txid of the swap that `sell_txid` deposited into, or empty while
/// it is pending.
pub async fn get_trade_txs(client: &VenueClient, midgard_url: &str, sell_txid: &str) -> SwapResult<TradeTxs> {
    let txid = sell_txid.trim_start_matches("0x");
    let response: MidgardActions = client
        .get_json(&format!("{}/v2/actions", midgard_url), &[("txid", txid.to_string())])
        .await?;

    let buy_txid = response
        .actions
        .first()
        .filter(|a| a.status == "success")
        .and_then(|a| a.out.first())
        .map(|out| {
            let is_evm = out.coins.first().is_some_and(|c| pool_chain(&c.asset) == "ETH");
            if is_evm {
                format!("0x{}", out.tx_id.to_lowercase())
            } else {
                out.tx_id.clone()
            }
        })
        .unwrap_or_default();

    Ok(TradeTxs {
        sell_txid: sell_txid.to_string(),
        buy_txid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::time::Duration;

    fn client() -> VenueClient {
        VenueClient::new("THORChain", Duration::from_secs(2)).unwrap()
    }

    const INBOUND: &str = r#"[
        {"chain":"BTC","address":"bc1qvault","halted":false,"chain_trading_paused":false,"global_trading_paused":false},
        {"chain":"ETH","address":"0x1111111111111111111111111111111111111111","router":"0x3624525075b88B24ecc29CE226b0CEc1fFcB6976","halted":false},
        {"chain":"GAIA","address":"cosmos1vault","halted":false,"chain_trading_paused":true}
    ]"#;

    #[test]
    fn memo_format() {
        assert_eq!(
            make_swap_memo("BTC.BTC", "bc1qdest", U256::from(42u64)),
            "s:BTC.BTC:bc1qdest:42"
        );
    }

    #[test]
    fn deposit_calldata_selector() {
        let data = encode_deposit_with_expiry(
            address!("1111111111111111111111111111111111111111"),
            None,
            U256::from(1u64),
            "s:BTC.BTC:bc1q:1",
            U256::from(1u64),
        );
        assert_eq!(&data[..4], IThorchainRouter::depositWithExpiryCall::SELECTOR.as_slice());
        let decoded = IThorchainRouter::depositWithExpiryCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.asset, Address::ZERO);
        assert_eq!(decoded.memo, "s:BTC.BTC:bc1q:1");
    }

    #[tokio::test]
    async fn inbound_lookup_fails_closed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lcd/thorchain/inbound_addresses")
            .with_body(INBOUND)
            .expect_at_least(1)
            .create_async()
            .await;

        let eth = get_inbound_address(&client(), &server.url(), "ETH.ETH").await.unwrap();
        assert_eq!(eth.router_address().unwrap(), address!("3624525075b88B24ecc29CE226b0CEc1fFcB6976"));

        let paused = get_inbound_address(&client(), &server.url(), "GAIA.ATOM").await.unwrap_err();
        assert!(paused.is(SwapErrorType::ResponseError));
        assert_eq!(paused.details.unwrap()["chainTradingPaused"], true);

        let missing = get_inbound_address(&client(), &server.url(), "LTC.LTC").await.unwrap_err();
        assert!(missing.is(SwapErrorType::ResponseError));
    }

    #[tokio::test]
    async fn midgard_success_yields_outbound_txid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/actions")
            .match_query(mockito::Matcher::UrlEncoded("txid".into(), "ABC123".into()))
            .with_body(r#"{"actions":[{"status":"success","out":[{"txID":"DEF456","coins":[{"asset":"ETH.ETH","amount":"1"}]}]}]}"#)
            .create_async()
            .await;

        let txs = get_trade_txs(&client(), &server.url(), "0xABC123").await.unwrap();
        assert_eq!(txs.sell_txid, "0xABC123");
        assert_eq!(txs.buy_txid, "0xdef456");
    }

    #[tokio::test]
    async fn midgard_pending_yields_empty_buy_txid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/actions")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"actions":[{"status":"pending","out":[]}]}"#)
            .create_async()
            .await;

        let txs = get_trade_txs(&client(), &server.url(), "btctxid").await.unwrap();
        assert_eq!(txs.buy_txid, "");
    }
}
