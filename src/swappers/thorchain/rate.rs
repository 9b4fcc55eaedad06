//! THORChain pricing: swap output formula, live quote rate and pool price ratio

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;
use super::pools::{is_rune, PoolGraph, ThornodePool};
use crate::{
    config::THOR_PRECISION,
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    network::VenueClient,
    types::{Asset, AssetId},
    utils::{base_unit_to_decimal, bps_to_decimal, decimal_to_base_unit, round_rate},
    validation::parse_base_units,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ThornodeQuoteFees {
    pub outbound: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThornodeQuote {
    pub expected_amount_out: String,
    pub fees: ThornodeQuoteFees,
    pub slippage_bps: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ThornodeQuoteResponse {
    Error { error: String },
    Quote(ThornodeQuote),
}

/// Output of swapping `input` through one pool, `x·X·Y / (x + X)²`, where
/// `X` is the input side balance and `Y` the output side.
pub fn get_swap_output(input: U256, pool: &ThornodePool, to_rune: bool) -> SwapResult<U256> {
    let (balance_asset, balance_rune) = pool.balances()?;
    let (input_balance, output_balance) = if to_rune {
        (balance_asset, balance_rune)
    } else {
        (balance_rune, balance_asset)
    };
    let denominator = (input + input_balance).pow(U256::from(2));
    Ok(input * input_balance * output_balance / denominator)
}

/// Chains the single pool formula through RUNE for asset to asset swaps.
pub fn get_double_swap_output(
    input: U256,
    graph: &PoolGraph,
    sell_asset_id: &AssetId,
    buy_asset_id: &AssetId,
) -> SwapResult<U256> {
    let rune = if is_rune(sell_asset_id) {
        input
    } else {
        get_swap_output(input, graph.require_pool(sell_asset_id)?, true)?
    };
    if is_rune(buy_asset_id) {
        return Ok(rune);
    }
    get_swap_output(rune, graph.require_pool(buy_asset_id)?, false)
}

/// Converts between an asset's own precision and THOR's 8 dp.
pub fn to_thor_base_unit(amount: U256, precision: u32) -> SwapResult<U256> {
    let human = base_unit_to_decimal(amount, precision)?;
    decimal_to_base_unit(human, THOR_PRECISION)
}

pub fn from_thor_base_unit(amount: U256, precision: u32) -> SwapResult<U256> {
    let human = base_unit_to_decimal(amount, THOR_PRECISION)?;
    decimal_to_base_unit(human, precision)
}

/// Units of the buy asset per unit of the sell asset from pool prices alone.
pub fn get_price_ratio(graph: &PoolGraph, sell_asset_id: &AssetId, buy_asset_id: &AssetId) -> SwapResult<Decimal> {
    let sell = graph.price_in_rune(sell_asset_id)?;
    let buy = graph.price_in_rune(buy_asset_id)?;
    sell.checked_div(buy)
        .map(round_rate)
        .ok_or_else(|| SwapError::new(SwapErrorType::PoolNotFound, "buy pool has no price"))
}

/// Live rate from the thornode quote endpoint with outbound fee and
/// slippage added back.
///
/// A zero amount, or one thornode rejects with `not enough fee`, is
/// `TradeBelowMinimum`; callers fall back to [`get_price_ratio`].
pub async fn get_trade_rate(
    client: &VenueClient,
    daemon_url: &str,
    graph: &PoolGraph,
    sell_asset: &Asset,
    buy_asset_id: &AssetId,
    sell_amount: U256,
    receive_address: &str,
) -> SwapResult<Decimal> {
    let below_minimum = |message: &str| {
        SwapError::new(SwapErrorType::TradeBelowMinimum, format!("[getTradeRate]: {}", message)).with_details(
            serde_json::json!({
                "sellAssetId": sell_asset.asset_id.as_str(),
                "buyAssetId": buy_asset_id.as_str(),
            }),
        )
    };

    if sell_amount.is_zero() {
        return Err(below_minimum("Sell amount is zero, cannot get a trade rate from Thorchain."));
    }

    let sell_pool_id = graph.pool_id(&sell_asset.asset_id)?;
    let buy_pool_id = graph.pool_id(buy_asset_id)?;
    let sell_amount_thor = to_thor_base_unit(sell_amount, sell_asset.precision)?;

    let response = client
        .get_raw(
            &format!("{}/lcd/thorchain/quote/swap", daemon_url),
            &[
                ("amount", sell_amount_thor.to_string()),
                ("from_asset", sell_pool_id),
                ("to_asset", buy_pool_id),
                ("destination", receive_address.to_string()),
            ],
        )
        .await?;
    // Thornode reports quote failures as `{ "error": ... }`, sometimes with a non-2xx status.
    let quote = match response.json::<ThornodeQuoteResponse>(client.venue()) {
        Ok(ThornodeQuoteResponse::Quote(quote)) => quote,
        Ok(ThornodeQuoteResponse::Error { error }) if error.contains("not enough fee") => {
            return Err(below_minimum("Sell amount is below the THOR minimum, cannot get a trade rate from Thorchain."));
        }
        Ok(ThornodeQuoteResponse::Error { error }) => {
            return Err(SwapError::new(
                SwapErrorType::TradeQuoteFailed,
                format!("[getTradeRate]: THORChain quote returned an error: {}", error),
            )
            .with_details(serde_json::json!({
                "sellAssetId": sell_asset.asset_id.as_str(),
                "buyAssetId": buy_asset_id.as_str(),
            })));
        }
        Err(e) => {
            response.clone().checked(client.venue())?;
            return Err(e);
        }
    };

    rate_from_quote(&quote, sell_amount_thor)
}

/// `(expected_out + outbound_fee) / (1 - slippage) / sell_amount`, all in
/// THOR base units.
pub fn rate_from_quote(quote: &ThornodeQuote, sell_amount_thor: U256) -> SwapResult<Decimal> {
    let expected = base_unit_to_decimal(parse_base_units(&quote.expected_amount_out, "expected_amount_out")?, 0)?;
    let outbound = base_unit_to_decimal(parse_base_units(&quote.fees.outbound, "fees.outbound")?, 0)?;
    let sell = base_unit_to_decimal(sell_amount_thor, 0)?;
    let slippage = bps_to_decimal(quote.slippage_bps);

    let before_slippage = (expected + outbound)
        .checked_div(Decimal::ONE - slippage)
        .ok_or_else(|| SwapError::new(SwapErrorType::ResponseError, "slippage of 100% in THORChain quote"))?;
    let rate = before_slippage
        .checked_div(sell)
        .ok_or_else(|| SwapError::new(SwapErrorType::ValidationFailed, "zero sell amount"))?;
    debug!("THORChain quote rate {} (slippage {} bps)", rate, quote.slippage_bps);
    Ok(round_rate(rate))
}

/// Minimum acceptable output for the swap memo: the pool formula output
/// reduced by `slippage`, in THOR base units.
pub fn get_limit(
    graph: &PoolGraph,
    sell_asset: &Asset,
    buy_asset_id: &AssetId,
    sell_amount: U256,
    slippage: Decimal,
) -> SwapResult<U256> {
    let sell_amount_thor = to_thor_base_unit(sell_amount, sell_asset.precision)?;
    let expected = get_double_swap_output(sell_amount_thor, graph, &sell_asset.asset_id, buy_asset_id)?;
    let expected = base_unit_to_decimal(expected, 0)?;
    let limit = (expected * (Decimal::ONE - slippage)).floor();
    decimal_to_base_unit(limit, 0).swap_err(SwapErrorType::ValidationFailed, "invalid swap limit")
}

#[cfg(test)]
mod tests {
    use super::super::pools::fixtures::*;
    use super::*;
    use crate::types::{btc, eth, fox, rune, usdc};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn graph() -> PoolGraph {
        PoolGraph::new(pools())
    }

    #[test]
    fn swap_output_follows_slip_formula() {
        let pool = pool("ETH.ETH", "1000", "1000");
        // 100 * 1000 * 1000 / 1100^2 = 82.64..
        assert_eq!(get_swap_output(U256::from(100), &pool, true).unwrap(), U256::from(82));
        assert_eq!(get_swap_output(U256::ZERO, &pool, false).unwrap(), U256::ZERO);
    }

    #[test]
    fn double_swap_chains_through_rune() {
        let graph = graph();
        let rune_out = get_swap_output(U256::from(100_000_000u64), graph.require_pool(&eth().asset_id).unwrap(), true).unwrap();
        let expected = get_swap_output(rune_out, graph.require_pool(&btc().asset_id).unwrap(), false).unwrap();
        assert_eq!(
            get_double_swap_output(U256::from(100_000_000u64), &graph, &eth().asset_id, &btc().asset_id).unwrap(),
            expected
        );
        assert_eq!(
            get_double_swap_output(U256::from(100_000_000u64), &graph, &eth().asset_id, &rune().asset_id).unwrap(),
            rune_out
        );
    }

    #[test]
    fn price_ratio_uses_rune_prices() {
        let graph = graph();
        assert_eq!(get_price_ratio(&graph, &eth().asset_id, &fox().asset_id).unwrap(), dec!(40000));
        assert_eq!(get_price_ratio(&graph, &fox().asset_id, &usdc().asset_id).unwrap(), dec!(0.05));
        assert_eq!(get_price_ratio(&graph, &rune().asset_id, &usdc().asset_id).unwrap(), dec!(1));
    }

    #[test]
    fn quote_rate_adds_back_fees_and_slippage() {
        let quote = ThornodeQuote {
            expected_amount_out: "3900".to_string(),
            fees: ThornodeQuoteFees { outbound: "100".to_string() },
            slippage_bps: 2000,
        };
        // (3900 + 100) / 0.8 / 1000
        assert_eq!(rate_from_quote(&quote, U256::from(1000)).unwrap(), dec!(5));
    }

    #[test]
    fn thor_precision_conversion() {
        let one_eth = U256::from(10u64).pow(U256::from(18));
        assert_eq!(to_thor_base_unit(one_eth, 18).unwrap(), U256::from(100_000_000u64));
        assert_eq!(from_thor_base_unit(U256::from(100_000_000u64), 6).unwrap(), U256::from(1_000_000u64));
    }

    #[test]
    fn limit_applies_slippage() {
        let graph = graph();
        let one_eth = U256::from(10u64).pow(U256::from(18));
        let full = get_limit(&graph, &eth(), &btc().asset_id, one_eth, dec!(0)).unwrap();
        let limited = get_limit(&graph, &eth(), &btc().asset_id, one_eth, dec!(0.1)).unwrap();
        assert!(limited < full);
        assert!(!limited.is_zero());
    }

    #[tokio::test]
    async fn zero_amount_never_reaches_thornode() {
        let mut server = mockito::Server::new_async().await;
        let quote = server
            .mock("GET", "/lcd/thorchain/quote/swap")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let client = VenueClient::new("THORChain", Duration::from_secs(2)).unwrap();

        let err = get_trade_rate(&client, &server.url(), &graph(), &eth(), &btc().asset_id, U256::ZERO, "bc1q")
            .await
            .unwrap_err();
        assert!(err.is(SwapErrorType::TradeBelowMinimum));
        quote.assert_async().await;
    }

    #[tokio::test]
    async fn not_enough_fee_is_below_minimum() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lcd/thorchain/quote/swap")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"failed to simulate swap: not enough fee"}"#)
            .create_async()
            .await;
        let client = VenueClient::new("THORChain", Duration::from_secs(2)).unwrap();

        let err = get_trade_rate(&client, &server.url(), &graph(), &eth(), &btc().asset_id, U256::from(1_000u64), "bc1q")
            .await
            .unwrap_err();
        assert!(err.is(SwapErrorType::TradeBelowMinimum));
    }

    #[tokio::test]
    async fn other_quote_errors_fail_the_quote() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lcd/thorchain/quote/swap")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"error":"trading is halted"}"#)
            .create_async()
            .await;
        let client = VenueClient::new("THORChain", Duration::from_secs(2)).unwrap();

        let err = get_trade_rate(&client, &server.url(), &graph(), &eth(), &btc().asset_id, U256::from(1_000u64), "bc1q")
            .await
            .unwrap_err();
        assert!(err.is(SwapErrorType::TradeQuoteFailed));
    }
}
