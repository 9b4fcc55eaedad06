//! Display and printing utilities

use tracing::{info, warn};
use crate::{
    manager::{BestQuote, RankedQuote},
    rates::TradeAmounts,
    utils::from_base_unit,
};

fn print_ranked_quote(rank: usize, ranked: &RankedQuote) {
    let quote = &ranked.quote;
    info!("   #{} {} ({:?})", rank, ranked.swapper_name, ranked.swapper_name);
    info!(
        "      Buy: {} {}  Rate: {}",
        from_base_unit(quote.buy_amount_crypto_base_unit, quote.buy_asset.precision),
        quote.buy_asset.symbol,
        quote.rate
    );
    info!("      Value after fees: ${:.2}", ranked.buy_amount_after_fees_usd);
    info!(
        "      Fees: network {} base units, sell side ${}, buy side ${}",
        quote.fee_data.network_fee_crypto_base_unit,
        quote.fee_data.sell_asset_trade_fee_usd,
        quote.fee_data.buy_asset_trade_fee_usd
    );
    if let Some(contract) = quote.allowance_contract {
        info!("      Allowance contract: {:#x}", contract);
    }
    let sources: Vec<String> = quote
        .sources
        .iter()
        .map(|source| format!("{} {:.0}%", source.name, source.proportion * rust_decimal_macros::dec!(100)))
        .collect();
    info!("      Sources: {}", sources.join(", "));
}

pub fn print_best_quote(best: &BestQuote) {
    let Some(top) = best.best.first() else {
        warn!("\n⚠️ No quotes");
        return;
    };
    let quote = &top.quote;
    info!(
        "\n💱 QUOTES {} {} -> {}",
        from_base_unit(quote.sell_amount_before_fees_crypto_base_unit, quote.sell_asset.precision),
        quote.sell_asset.symbol,
        quote.buy_asset.symbol
    );
    for (i, ranked) in best.ranked.iter().enumerate() {
        print_ranked_quote(i + 1, ranked);
    }
    if best.is_tie() {
        warn!("⚖️  {} venues tied for best", best.best.len());
    } else {
        info!("🏆 Best: {}", top.swapper_name);
    }
    info!("");
}

pub fn print_trade_amounts(amounts: &TradeAmounts, sell_symbol: &str, buy_symbol: &str) {
    info!("📋 Trade amounts:");
    info!(
        "   Sell: {} {} (${:.2})",
        amounts.sell_amount_sell_asset_crypto_precision, sell_symbol, amounts.fiat_sell_amount
    );
    info!(
        "   Buy:  {} {} (${:.2})",
        amounts.buy_amount_buy_asset_crypto_precision, buy_symbol, amounts.fiat_buy_amount
    );
}
