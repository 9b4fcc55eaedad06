//! Allowance checks and approval transactions for ERC20 sells

use alloy::primitives::{Address, U256};
use std::str::FromStr;
use tracing::{debug, info};
use crate::{
    allowance::{decode_allowance, encode_allowance, encode_approve},
    chain::{sign_and_send, BuildSendTxInput, ChainAdapter, EvmChainAdapter, TxKind, Wallet},
    config::{PollConfig, APPROVAL_GAS_LIMIT},
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    network::poll_until,
    types::{ApprovalNeeded, Asset, TradeQuote},
};

pub const MAX_ALLOWANCE: U256 = U256::MAX;

pub fn approval_gas_limit() -> U256 {
    U256::from(APPROVAL_GAS_LIMIT)
}

/// Fee of an approval transaction at `gas_price`.
pub fn approval_fee(gas_price: U256) -> U256 {
    approval_gas_limit() * gas_price
}

fn evm_adapter(adapter: &dyn ChainAdapter) -> SwapResult<&dyn EvmChainAdapter> {
    adapter.as_evm().ok_or_else(|| {
        SwapError::new(
            SwapErrorType::UnsupportedChain,
            format!("{} has no contract read capability", adapter.chain_id()),
        )
    })
}

fn erc20_address(asset: &Asset) -> SwapResult<Address> {
    asset.erc20_address().ok_or_else(|| {
        SwapError::new(SwapErrorType::ValidationFailed, format!("{} is not an ERC20 token", asset.asset_id))
            .with_details(serde_json::json!({ "assetId": asset.asset_id.as_str() }))
    })
}

fn parse_owner(address: &str) -> SwapResult<Address> {
    Address::from_str(address).swap_err(SwapErrorType::ValidationFailed, "invalid owner address")
}

pub async fn get_erc20_allowance(
    adapter: &dyn EvmChainAdapter,
    token: Address,
    owner: Address,
    spender: Address,
) -> SwapResult<U256> {
    let reply = adapter.call(token, encode_allowance(owner, spender)).await?;
    decode_allowance(&reply)
}

/// Whether `owner` must approve `allowance_contract` before selling
/// `sell_amount_exclude_fee` of `sell_asset`.
pub async fn is_approval_required(
    adapter: &dyn ChainAdapter,
    receive_address: &str,
    allowance_contract: Address,
    sell_asset: &Asset,
    sell_amount_exclude_fee: U256,
) -> SwapResult<bool> {
    if sell_asset.asset_id == adapter.fee_asset_id() {
        return Ok(false);
    }

    let evm = evm_adapter(adapter)?;
    let token = erc20_address(sell_asset)?;
    let owner = parse_owner(receive_address)?;

    let reply = evm
        .call(token, encode_allowance(owner, allowance_contract))
        .await
        .map_err(|e| {
            SwapError::new(SwapErrorType::AllowanceRequiredFailed, "[isApprovalRequired] allowance read failed")
                .with_cause(e)
        })?;
    let allowance = decode_allowance(&reply)?;

    if allowance.is_zero() {
        return Ok(true);
    }
    Ok(sell_amount_exclude_fee > allowance)
}

/// Approval check shared by the EVM venues.
pub async fn evm_approval_needed(
    adapter: &dyn ChainAdapter,
    wallet: &dyn Wallet,
    quote: &TradeQuote,
) -> SwapResult<ApprovalNeeded> {
    check_approval(adapter, wallet, quote)
        .await
        .swap_err(SwapErrorType::CheckApprovalFailed, "[approvalNeeded]")
}

async fn check_approval(adapter: &dyn ChainAdapter, wallet: &dyn Wallet, quote: &TradeQuote) -> SwapResult<ApprovalNeeded> {
    if quote.sell_asset.asset_id == adapter.fee_asset_id() {
        return Ok(ApprovalNeeded { approval_needed: false });
    }

    let spender = quote.allowance_contract.ok_or_else(|| {
        SwapError::new(SwapErrorType::ValidationFailed, "[approvalNeeded] allowance contract is required")
            .with_details(serde_json::json!({ "sellAssetId": quote.sell_asset.asset_id.as_str() }))
    })?;
    if quote.fee_data.gas_price().is_none() {
        return Err(SwapError::new(
            SwapErrorType::ResponseError,
            "[approvalNeeded] no gas price found on quote",
        ));
    }

    let evm = evm_adapter(adapter)?;
    let owner = parse_owner(&adapter.get_address(wallet, quote.account_number).await?)?;
    let allowance = get_erc20_allowance(evm, erc20_address(&quote.sell_asset)?, owner, spender).await?;
    debug!(
        "allowance of {} for {} is {}",
        quote.sell_asset.symbol, spender, allowance
    );

    Ok(ApprovalNeeded {
        approval_needed: allowance < quote.sell_amount_before_fees_crypto_base_unit,
    })
}

/// Sends `approve(allowance_contract, amount)` for the quote's sell token
/// using the quote's gas price and estimated gas. Returns the txid.
pub async fn grant_allowance(
    adapter: &dyn ChainAdapter,
    wallet: &dyn Wallet,
    quote: &TradeQuote,
    amount: U256,
) -> SwapResult<String> {
    send_approval(adapter, wallet, quote, amount)
        .await
        .swap_err(SwapErrorType::GrantAllowanceFailed, "[grantAllowance]")
}

async fn send_approval(adapter: &dyn ChainAdapter, wallet: &dyn Wallet, quote: &TradeQuote, amount: U256) -> SwapResult<String> {
    let token = erc20_address(&quote.sell_asset)?;
    let spender = quote.allowance_contract.ok_or_else(|| {
        SwapError::new(SwapErrorType::ValidationFailed, "[grantAllowance] allowance contract is required")
    })?;
    let chain_specific = quote.fee_data.chain_specific.as_ref().ok_or_else(|| {
        SwapError::new(SwapErrorType::ResponseError, "[grantAllowance] no gas data found on quote")
    })?;

    let input = BuildSendTxInput {
        to: format!("{:#x}", token),
        value: U256::ZERO,
        account_number: quote.account_number,
        memo: None,
        kind: TxKind::EvmCall {
            data: encode_approve(spender, amount),
            gas_limit: chain_specific.estimated_gas_crypto_base_unit,
            gas_price: chain_specific.gas_price_crypto_base_unit,
        },
    };
    let tx = adapter.build_send_transaction(&input, wallet).await?;
    let txid = sign_and_send(adapter, wallet, tx).await?;
    info!("📝 Approval for {} sent: {}", quote.sell_asset.symbol, txid);
    Ok(txid)
}

fn with_approval_gas(quote: &TradeQuote) -> TradeQuote {
    let mut quote = quote.clone();
    if let Some(chain_specific) = quote.fee_data.chain_specific.as_mut() {
        chain_specific.estimated_gas_crypto_base_unit = approval_gas_limit();
    }
    quote
}

pub async fn approve_infinite(adapter: &dyn ChainAdapter, wallet: &dyn Wallet, quote: &TradeQuote) -> SwapResult<String> {
    grant_allowance(adapter, wallet, &with_approval_gas(quote), MAX_ALLOWANCE)
        .await
        .swap_err(SwapErrorType::ApproveInfiniteFailed, "[approveInfinite]")
}

/// Approves exactly `amount`, or the quote's sell amount when `None`.
pub async fn approve_amount(
    adapter: &dyn ChainAdapter,
    wallet: &dyn Wallet,
    quote: &TradeQuote,
    amount: Option<U256>,
) -> SwapResult<String> {
    let amount = amount.unwrap_or(quote.sell_amount_before_fees_crypto_base_unit);
    grant_allowance(adapter, wallet, &with_approval_gas(quote), amount).await
}

/// Polls the allowance until it covers `amount`.
pub async fn wait_for_allowance(
    adapter: &dyn EvmChainAdapter,
    token: Address,
    owner: Address,
    spender: Address,
    amount: U256,
    poll: &PollConfig,
) -> SwapResult<U256> {
    poll_until(
        || async move {
            let allowance = get_erc20_allowance(adapter, token, owner, spender).await?;
            Ok((allowance >= amount).then_some(allowance))
        },
        poll,
        "allowance confirmation",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CallReply, MockAdapter, MockWallet, WALLET_ADDRESS};
    use crate::types::{eth, wbtc, weth, EvmFeeData, QuoteFeeData, SwapSource, ETHEREUM_MAINNET};
    use crate::utils::ExactDecimal;
    use alloy::primitives::address;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const SPENDER: Address = address!("C92E8bdf79f0507f65a392b0ab4667716BFE0110");

    fn owner() -> String {
        format!("{:#x}", WALLET_ADDRESS)
    }

    fn quote(sell: Asset, amount: u64) -> TradeQuote {
        TradeQuote {
            sell_asset: sell,
            buy_asset: weth(),
            sell_amount_before_fees_crypto_base_unit: U256::from(amount),
            buy_amount_crypto_base_unit: U256::from(1),
            rate: dec!(1),
            fee_data: QuoteFeeData {
                network_fee_crypto_base_unit: U256::ZERO,
                sell_asset_trade_fee_usd: ExactDecimal::ZERO,
                buy_asset_trade_fee_usd: ExactDecimal::ZERO,
                chain_specific: Some(EvmFeeData {
                    estimated_gas_crypto_base_unit: U256::from(250_000u64),
                    gas_price_crypto_base_unit: U256::from(79_036_500_000u64),
                    approval_fee_crypto_base_unit: None,
                }),
            },
            minimum_crypto_human: dec!(0),
            maximum_crypto_human: dec!(1),
            allowance_contract: Some(SPENDER),
            account_number: 0,
            sources: SwapSource::whole("test"),
        }
    }

    #[tokio::test]
    async fn fee_asset_skips_allowance_read() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_allowance(U256::ZERO);
        let required = is_approval_required(&adapter, &owner(), SPENDER, &eth(), U256::from(10)).await.unwrap();
        assert!(!required);
        assert_eq!(adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn zero_allowance_requires_approval() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_allowance(U256::ZERO);
        let required = is_approval_required(&adapter, &owner(), SPENDER, &wbtc(), U256::ZERO).await.unwrap();
        assert!(required);
    }

    #[tokio::test]
    async fn approval_required_only_when_amount_exceeds_allowance() {
        for (allowance, amount, expected) in [(100u64, 101u64, true), (100, 100, false), (100, 5, false)] {
            let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_allowance(U256::from(allowance));
            let required = is_approval_required(&adapter, &owner(), SPENDER, &wbtc(), U256::from(amount))
                .await
                .unwrap();
            assert_eq!(required, expected, "allowance {} amount {}", allowance, amount);
        }
    }

    #[tokio::test]
    async fn empty_allowance_reply_is_response_error() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_call_replies(vec![CallReply::Empty]);
        let err = is_approval_required(&adapter, &owner(), SPENDER, &wbtc(), U256::from(1)).await.unwrap_err();
        assert!(err.is(SwapErrorType::ResponseError));
    }

    #[tokio::test]
    async fn failed_allowance_read_is_allowance_required_failed() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_call_replies(vec![CallReply::Fail]);
        let err = is_approval_required(&adapter, &owner(), SPENDER, &wbtc(), U256::from(1)).await.unwrap_err();
        assert!(err.is(SwapErrorType::AllowanceRequiredFailed));
        assert!(err.cause.is_some());
    }

    #[tokio::test]
    async fn approval_needed_compares_against_sell_amount() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_allowance(U256::from(50));
        let wallet = MockWallet::offline();
        assert!(evm_approval_needed(&adapter, &wallet, &quote(wbtc(), 51)).await.unwrap().approval_needed);
        assert!(!evm_approval_needed(&adapter, &wallet, &quote(wbtc(), 50)).await.unwrap().approval_needed);
        assert!(!evm_approval_needed(&adapter, &wallet, &quote(eth(), 1)).await.unwrap().approval_needed);
    }

    #[tokio::test]
    async fn approval_needed_validates_quote() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_allowance(U256::ZERO);
        let wallet = MockWallet::offline();

        let mut no_spender = quote(wbtc(), 1);
        no_spender.allowance_contract = None;
        let err = evm_approval_needed(&adapter, &wallet, &no_spender).await.unwrap_err();
        assert!(err.is(SwapErrorType::ValidationFailed));

        let mut no_gas = quote(wbtc(), 1);
        no_gas.fee_data.chain_specific = None;
        let err = evm_approval_needed(&adapter, &wallet, &no_gas).await.unwrap_err();
        assert!(err.is(SwapErrorType::ResponseError));
    }

    #[tokio::test]
    async fn approve_infinite_uses_max_allowance_and_fixed_gas() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_txids(&["0xapprove"]);
        let txid = approve_infinite(&adapter, &MockWallet::offline(), &quote(wbtc(), 1)).await.unwrap();
        assert_eq!(txid, "0xapprove");

        let built = adapter.built();
        assert_eq!(built.len(), 1);
        match &built[0].kind {
            TxKind::EvmCall { data, gas_limit, gas_price } => {
                assert_eq!(*data, encode_approve(SPENDER, MAX_ALLOWANCE));
                assert_eq!(*gas_limit, U256::from(APPROVAL_GAS_LIMIT));
                assert_eq!(*gas_price, U256::from(79_036_500_000u64));
            }
            other => panic!("unexpected tx kind {:?}", other),
        }
    }

    #[tokio::test]
    async fn approve_amount_defaults_to_sell_amount() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET);
        approve_amount(&adapter, &MockWallet::offline(), &quote(wbtc(), 777), None).await.unwrap();
        match &adapter.built()[0].kind {
            TxKind::EvmCall { data, .. } => assert_eq!(*data, encode_approve(SPENDER, U256::from(777))),
            other => panic!("unexpected tx kind {:?}", other),
        }
    }

    #[tokio::test]
    async fn grant_allowance_without_signing_capability_fails() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET);
        let err = grant_allowance(&adapter, &MockWallet::incapable(), &quote(wbtc(), 1), U256::from(1))
            .await
            .unwrap_err();
        assert!(err.is(SwapErrorType::SignAndBroadcastFailed));
    }

    #[tokio::test]
    async fn grant_allowance_rejects_native_sell_asset() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET);
        let err = grant_allowance(&adapter, &MockWallet::offline(), &quote(eth(), 1), U256::from(1))
            .await
            .unwrap_err();
        assert!(err.is(SwapErrorType::ValidationFailed));
    }

    #[tokio::test]
    async fn waits_until_allowance_covers_amount() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_call_replies(vec![
            CallReply::Allowance(U256::ZERO),
            CallReply::Allowance(U256::from(5)),
            CallReply::Allowance(U256::from(10)),
        ]);
        let poll = PollConfig { interval: Duration::from_millis(1), max_attempts: 5 };
        let allowance = wait_for_allowance(&adapter, wbtc().erc20_address().unwrap(), WALLET_ADDRESS, SPENDER, U256::from(10), &poll)
            .await
            .unwrap();
        assert_eq!(allowance, U256::from(10));
        assert_eq!(adapter.call_count(), 3);
    }

    #[tokio::test]
    async fn allowance_wait_times_out() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_allowance(U256::ZERO);
        let poll = PollConfig { interval: Duration::from_millis(1), max_attempts: 3 };
        let err = wait_for_allowance(&adapter, wbtc().erc20_address().unwrap(), WALLET_ADDRESS, SPENDER, U256::from(1), &poll)
            .await
            .unwrap_err();
        assert!(err.is(SwapErrorType::Timeout));
    }

    #[test]
    fn approval_fee_is_gas_limit_times_price() {
        assert_eq!(approval_fee(U256::from(79_036_500_000u64)), U256::from(7_903_650_000_000_000u64));
    }
}
