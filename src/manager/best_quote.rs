//! Concurrent quote fan-out and USD ranking

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use crate::{
    errors::{SwapError, SwapErrorType, SwapResult},
    swapper::Swapper,
    types::{GetTradeQuoteInput, SwapperName, TradeQuote},
    utils::{base_unit_to_decimal, ExactDecimal},
};
use super::SwapperManager;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedQuote {
    pub swapper_name: SwapperName,
    pub quote: TradeQuote,
    /// Buy amount valued in USD, less the quote's trade fees.
    pub buy_amount_after_fees_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestQuote {
    /// The best quote plus any within epsilon of it.
    pub best: Vec<RankedQuote>,
    /// Every quote that came back, best first.
    pub ranked: Vec<RankedQuote>,
}

impl BestQuote {
    /// More than one venue is within epsilon; the caller breaks the tie.
    pub fn is_tie(&self) -> bool {
        self.best.len() > 1
    }
}

pub fn buy_amount_after_fees_usd(quote: &TradeQuote, buy_usd_rate: Decimal) -> SwapResult<Decimal> {
    let buy_amount = base_unit_to_decimal(quote.buy_amount_crypto_base_unit, quote.buy_asset.precision)?;
    let fees = quote.fee_data.sell_asset_trade_fee_usd.to_decimal()? + quote.fee_data.buy_asset_trade_fee_usd.to_decimal()?;
    Ok(buy_amount * buy_usd_rate - fees)
}

async fn rank(swapper: &dyn Swapper, input: &GetTradeQuoteInput) -> Result<RankedQuote, (SwapperName, SwapError)> {
    let swapper_name = swapper.name();
    let ranked = async {
        let quote = swapper.get_trade_quote(input).await?;
        let buy_usd_rate = swapper.get_usd_rate(&input.buy_asset).await?;
        let buy_amount_after_fees_usd = buy_amount_after_fees_usd(&quote, buy_usd_rate)?;
        Ok::<_, SwapError>(RankedQuote {
            swapper_name,
            quote,
            buy_amount_after_fees_usd,
        })
    };
    ranked.await.map_err(|e| (swapper_name, e))
}

impl SwapperManager {
    /// Quotes every venue supporting the pair at once and ranks the answers.
    /// Venues that fail are logged and left out.
    pub async fn get_best_quote(&self, input: &GetTradeQuoteInput, epsilon: Decimal) -> SwapResult<BestQuote> {
        let swappers = self.get_swappers_by_pair(&input.sell_asset.asset_id, &input.buy_asset.asset_id);
        if swappers.is_empty() {
            return Err(SwapError::new(
                SwapErrorType::UnsupportedPair,
                format!("no swapper supports {} -> {}", input.sell_asset.symbol, input.buy_asset.symbol),
            )
            .with_details(serde_json::json!({
                "sellAssetId": input.sell_asset.asset_id.as_str(),
                "buyAssetId": input.buy_asset.asset_id.as_str(),
            })));
        }

        let results = join_all(swappers.iter().map(|swapper| rank(swapper.as_ref(), input))).await;
        let mut ranked: Vec<RankedQuote> = results
            .into_iter()
            .filter_map(|result| match result {
                Ok(ranked) => Some(ranked),
                Err((name, e)) => {
                    warn!("⚠️ {} quote dropped: {}", name, e);
                    None
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.buy_amount_after_fees_usd.cmp(&a.buy_amount_after_fees_usd));
        let Some(top) = ranked.first().map(|q| q.buy_amount_after_fees_usd) else {
            return Err(SwapError::new(
                SwapErrorType::TradeQuoteFailed,
                format!("no swapper quoted {} -> {}", input.sell_asset.symbol, input.buy_asset.symbol),
            ));
        };
        let best: Vec<RankedQuote> = ranked
            .iter()
            .take_while(|q| top - q.buy_amount_after_fees_usd <= epsilon)
            .cloned()
            .collect();

        info!(
            "🏆 Best {} -> {} quote: {} at ${} ({} of {} venues tied)",
            input.sell_asset.symbol,
            input.buy_asset.symbol,
            best[0].swapper_name,
            top.round_dp(2),
            best.len(),
            ranked.len()
        );
        Ok(BestQuote { best, ranked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{quote, MockSwapper};
    use crate::types::{eth, fox};
    use crate::utils::pow10_u256;
    use alloy::primitives::U256;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn fox_amount(whole: u64) -> U256 {
        U256::from(whole) * pow10_u256(18)
    }

    fn venue(name: SwapperName, buy_fox: u64, sell_fee_usd: Decimal) -> MockSwapper {
        let mut q = quote(eth(), fox(), pow10_u256(18), fox_amount(buy_fox));
        q.fee_data.sell_asset_trade_fee_usd = ExactDecimal::from_decimal(sell_fee_usd).unwrap();
        MockSwapper::new(name, vec![eth().asset_id, fox().asset_id]).with_quote(q, dec!(0.1))
    }

    fn input() -> GetTradeQuoteInput {
        GetTradeQuoteInput::new(eth(), fox(), pow10_u256(18))
    }

    #[tokio::test]
    async fn ranks_by_usd_after_fees() {
        let mut manager = SwapperManager::new();
        manager
            .add_swapper(Arc::new(venue(SwapperName::ZrxEthereum, 100, Decimal::ZERO)))
            .add_swapper(Arc::new(venue(SwapperName::CowSwap, 120, dec!(3))));

        let best = manager.get_best_quote(&input(), Decimal::ZERO).await.unwrap();
        assert!(!best.is_tie());
        assert_eq!(best.best[0].swapper_name, SwapperName::ZrxEthereum);
        assert_eq!(best.best[0].buy_amount_after_fees_usd, dec!(10));
        assert_eq!(best.ranked[1].buy_amount_after_fees_usd, dec!(9));
    }

    #[tokio::test]
    async fn near_equal_quotes_tie() {
        let mut manager = SwapperManager::new();
        manager
            .add_swapper(Arc::new(venue(SwapperName::ZrxEthereum, 100, Decimal::ZERO)))
            .add_swapper(Arc::new(venue(SwapperName::CowSwap, 100, dec!(0.005))));

        let best = manager.get_best_quote(&input(), dec!(0.01)).await.unwrap();
        assert!(best.is_tie());
        assert_eq!(best.best[0].swapper_name, SwapperName::ZrxEthereum);
    }

    #[tokio::test]
    async fn failed_venues_are_dropped() {
        let failing = Arc::new(MockSwapper::new(SwapperName::CowSwap, vec![eth().asset_id, fox().asset_id]));
        let mut manager = SwapperManager::new();
        manager
            .add_swapper(failing.clone())
            .add_swapper(Arc::new(venue(SwapperName::ZrxEthereum, 100, Decimal::ZERO)));

        let best = manager.get_best_quote(&input(), Decimal::ZERO).await.unwrap();
        assert_eq!(best.ranked.len(), 1);
        assert_eq!(failing.quotes_requested(), 1);

        manager.remove_swapper(SwapperName::ZrxEthereum).unwrap();
        let err = manager.get_best_quote(&input(), Decimal::ZERO).await.unwrap_err();
        assert!(err.is(SwapErrorType::TradeQuoteFailed));
    }

    #[tokio::test]
    async fn unsupported_pair_asks_nobody() {
        let venue = Arc::new(MockSwapper::new(SwapperName::ZrxEthereum, vec![eth().asset_id]));
        let mut manager = SwapperManager::new();
        manager.add_swapper(venue.clone());

        let err = manager.get_best_quote(&input(), Decimal::ZERO).await.unwrap_err();
        assert!(err.is(SwapErrorType::UnsupportedPair));
        assert_eq!(venue.quotes_requested(), 0);
    }
}
