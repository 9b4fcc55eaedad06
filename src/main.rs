//! Swapper quote - composition root
//!
//! Builds the swapper manager from feature flags and prints the best quote
//! for the configured pair.

use swapper_core::*;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use swapper_core::{
    chain::{AdapterManager, AlloyEvmAdapter, LocalWallet},
    config::BEST_QUOTE_EPSILON_USD,
    manager::SwapperDeps,
    rates::{TradeAmountInputField, TradeAmountState},
    utils::{base_unit_to_decimal, print_best_quote, print_trade_amounts, to_base_unit},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    utils::setup_output_directories()?;
    let _logging_guard = utils::setup_logging()?;

    // Load configuration
    let config = CONFIG.clone();

    info!("💱 Swapper Core v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Flags: {:?}", config.flags);
    info!("   HTTP timeout: {}s", config.http_timeout.as_secs());
    info!(
        "   Polling: every {}ms, {} attempts",
        config.poll.interval.as_millis(),
        config.poll.max_attempts
    );
    info!("   Default slippage: {}", config.default_slippage);

    let mut adapters = AdapterManager::new();
    match AlloyEvmAdapter::connect(&config.ethereum_rpc_url, eth().asset_id).await {
        Ok(adapter) => adapters.insert(Arc::new(adapter)),
        Err(e) => warn!("⚠️ Ethereum adapter unavailable, EVM venues disabled: {}", e),
    }

    let wallet = match &config.private_key {
        Some(key) => Some(LocalWallet::from_private_key(key)?),
        None => None,
    };
    if let Some(wallet) = &wallet {
        info!("🔑 Wallet: {:#x}", wallet.address());
    }

    let cache = SwapperManagerCache::new();
    let deps = SwapperDeps {
        config: config.clone(),
        adapters,
    };
    let manager = cache.get_or_build(&config.flags, &deps).await;
    if manager.is_empty() {
        warn!("⚠️ No venues registered, enable one with SWAPPER_FLAGS_*");
        return Ok(());
    }

    let sell_asset = find_asset(&config.quote_sell_asset)
        .with_context(|| format!("unknown sell asset {}", config.quote_sell_asset))?;
    let buy_asset = find_asset(&config.quote_buy_asset)
        .with_context(|| format!("unknown buy asset {}", config.quote_buy_asset))?;
    let sell_amount = to_base_unit(&config.quote_sell_amount, sell_asset.precision)?;

    let buyable = manager.get_supported_buy_asset_ids_from_sell_id(
        &sell_asset.asset_id,
        &known_assets().into_iter().map(|a| a.asset_id).collect::<Vec<_>>(),
    );
    info!("🔎 {} can be swapped into {} known assets", sell_asset.symbol, buyable.len());

    let mut input = GetTradeQuoteInput::new(sell_asset.clone(), buy_asset.clone(), sell_amount);
    input.receive_address = wallet.as_ref().map(|w| format!("{:#x}", w.address()));

    let best = manager.get_best_quote(&input, BEST_QUOTE_EPSILON_USD).await?;
    print_best_quote(&best);

    let top = best.best.first().context("best quote is empty")?;
    let swapper = manager.get_swapper(top.swapper_name)?;
    let state = TradeAmountState {
        action: TradeAmountInputField::SellCrypto,
        amount: base_unit_to_decimal(sell_amount, sell_asset.precision)?,
        sell_asset_fiat_rate: swapper.get_usd_rate(&sell_asset).await?,
        buy_asset_fiat_rate: swapper.get_usd_rate(&buy_asset).await?,
        selected_currency_to_usd_rate: rust_decimal::Decimal::ONE,
        sell_asset_trade_fee_usd: top.quote.fee_data.sell_asset_trade_fee_usd.to_decimal()?,
        buy_asset_trade_fee_usd: top.quote.fee_data.buy_asset_trade_fee_usd.to_decimal()?,
        quote: Some(top.quote.clone()),
        slippage: config.default_slippage,
        sell_asset,
        buy_asset,
    };
    print_trade_amounts(&state.trade_amounts_from_quote()?, &state.sell_asset.symbol, &state.buy_asset.symbol);

    Ok(())
}
