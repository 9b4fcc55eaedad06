//! THORChain pool graph and pool id <-> asset id mapping

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::Deserialize;
use crate::{
    errors::{SwapError, SwapErrorType, SwapResult},
    types::{AssetId, ATOM_ASSET_ID, BTC_ASSET_ID, ETHEREUM_MAINNET, ETH_ASSET_ID, RUNE_ASSET_ID},
    utils::base_unit_to_decimal,
    validation::{parse_base_units, validate_pool_depth},
};

pub const RUNE_POOL_ID: &str = "THOR.RUNE";

/// Thornode `/thorchain/pools` entry. Balances are THOR base units (8 dp).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThornodePool {
    pub asset: String,
    pub balance_asset: String,
    pub balance_rune: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl ThornodePool {
    pub fn balances(&self) -> SwapResult<(U256, U256)> {
        let asset = parse_base_units(&self.balance_asset, "balance_asset")?;
        let rune = parse_base_units(&self.balance_rune, "balance_rune")?;
        validate_pool_depth(asset, rune, &self.asset)?;
        Ok((asset, rune))
    }

    /// RUNE per unit of the pool asset.
    pub fn price_in_rune(&self) -> SwapResult<Decimal> {
        let (asset, rune) = self.balances()?;
        let asset = base_unit_to_decimal(asset, 0)?;
        let rune = base_unit_to_decimal(rune, 0)?;
        rune.checked_div(asset)
            .ok_or_else(|| SwapError::new(SwapErrorType::PoolNotFound, format!("pool {} is empty", self.asset)))
    }
}

/// Maps a pool id such as `ETH.FOX-0XC770...` to its asset id. Pools on
/// chains this crate has no adapter for map to `None`.
pub fn pool_id_to_asset_id(pool_id: &str) -> Option<AssetId> {
    let (chain, symbol) = pool_id.split_once('.')?;
    let raw = match (chain, symbol) {
        ("ETH", "ETH") => ETH_ASSET_ID.to_string(),
        ("ETH", token) => {
            let (_, contract) = token.split_once('-')?;
            format!("{}/erc20:{}", ETHEREUM_MAINNET, contract.to_lowercase())
        }
        ("BTC", "BTC") => BTC_ASSET_ID.to_string(),
        ("GAIA", "ATOM") => ATOM_ASSET_ID.to_string(),
        ("THOR", "RUNE") => RUNE_ASSET_ID.to_string(),
        _ => return None,
    };
    raw.parse().ok()
}

/// Inbound chain key of a pool id (`ETH`, `BTC`, `GAIA`).
pub fn pool_chain(pool_id: &str) -> &str {
    pool_id.split_once('.').map(|(chain, _)| chain).unwrap_or(pool_id)
}

pub fn is_rune(asset_id: &AssetId) -> bool {
    asset_id.as_str() == RUNE_ASSET_ID
}

/// Pools fetched at initialization, keyed implicitly by asset id.
#[derive(Debug, Clone, Default)]
pub struct PoolGraph {
    pools: Vec<(AssetId, ThornodePool)>,
}

impl PoolGraph {
    pub fn new(pools: Vec<ThornodePool>) -> Self {
        let pools = pools
            .into_iter()
            .filter(|p| p.status.as_deref().map_or(true, |s| s.eq_ignore_ascii_case("available")))
            .filter_map(|p| pool_id_to_asset_id(&p.asset).map(|id| (id, p)))
            .collect();
        Self { pools }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn pool(&self, asset_id: &AssetId) -> Option<&ThornodePool> {
        self.pools.iter().find(|(id, _)| id == asset_id).map(|(_, p)| p)
    }

    pub fn require_pool(&self, asset_id: &AssetId) -> SwapResult<&ThornodePool> {
        self.pool(asset_id).ok_or_else(|| {
            SwapError::new(SwapErrorType::PoolNotFound, format!("no THORChain pool for {}", asset_id))
                .with_details(serde_json::json!({ "assetId": asset_id.as_str() }))
        })
    }

    /// Pool id as thornode spells it; RUNE has no pool of its own.
    pub fn pool_id(&self, asset_id: &AssetId) -> SwapResult<String> {
        if is_rune(asset_id) {
            return Ok(RUNE_POOL_ID.to_string());
        }
        Ok(self.require_pool(asset_id)?.asset.clone())
    }

    pub fn supports(&self, asset_id: &AssetId) -> bool {
        self.pool(asset_id).is_some()
    }

    /// RUNE per unit of `asset_id`; RUNE itself is 1.
    pub fn price_in_rune(&self, asset_id: &AssetId) -> SwapResult<Decimal> {
        if is_rune(asset_id) {
            return Ok(Decimal::ONE);
        }
        self.require_pool(asset_id)?.price_in_rune()
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &AssetId> {
        self.pools.iter().map(|(id, _)| id)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::ThornodePool;

    pub fn pool(asset: &str, balance_asset: &str, balance_rune: &str) -> ThornodePool {
        ThornodePool {
            asset: asset.to_string(),
            balance_asset: balance_asset.to_string(),
            balance_rune: balance_rune.to_string(),
            status: Some("Available".to_string()),
        }
    }

    pub const FOX_POOL: &str = "ETH.FOX-0XC770EEFAD204B5180DF6A14EE197D99D808EE52D";
    pub const USDC_POOL: &str = "ETH.USDC-0XA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48";

    /// ETH at 2000 RUNE, FOX at 0.05 RUNE, BTC at 20000 RUNE, USDC at 1 RUNE.
    pub fn pools() -> Vec<ThornodePool> {
        vec![
            pool("ETH.ETH", "10000000000", "20000000000000"),
            pool(FOX_POOL, "400000000000000", "20000000000000"),
            pool("BTC.BTC", "1000000000", "20000000000000"),
            pool(USDC_POOL, "20000000000000", "20000000000000"),
            pool("GAIA.ATOM", "100000000000", "1000000000000"),
            pool("LTC.LTC", "100000000000", "1000000000000"),
        ]
    }

    pub fn pools_json() -> String {
        let entries: Vec<serde_json::Value> = pools()
            .into_iter()
            .map(|p| {
                serde_json::json!({
                    "asset": p.asset,
                    "balance_asset": p.balance_asset,
                    "balance_rune": p.balance_rune,
                    "status": "Available",
                })
            })
            .collect();
        serde_json::Value::Array(entries).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::types::{atom, btc, eth, fox, rune, usdc};
    use rust_decimal_macros::dec;

    #[test]
    fn maps_pool_ids() {
        assert_eq!(pool_id_to_asset_id("ETH.ETH"), Some(eth().asset_id));
        assert_eq!(pool_id_to_asset_id(FOX_POOL), Some(fox().asset_id));
        assert_eq!(pool_id_to_asset_id("BTC.BTC"), Some(btc().asset_id));
        assert_eq!(pool_id_to_asset_id("GAIA.ATOM"), Some(atom().asset_id));
        assert_eq!(pool_id_to_asset_id("THOR.RUNE"), Some(rune().asset_id));
        assert_eq!(pool_id_to_asset_id("LTC.LTC"), None);
        assert_eq!(pool_chain(FOX_POOL), "ETH");
    }

    #[test]
    fn graph_skips_unmapped_and_staged_pools() {
        let mut pools = pools();
        pools.push(ThornodePool {
            status: Some("Staged".to_string()),
            ..pool("ETH.NEW-0X0000000000000000000000000000000000000001", "1", "1")
        });
        let graph = PoolGraph::new(pools);
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.pool_id(&usdc().asset_id).unwrap(), USDC_POOL);
        assert_eq!(graph.pool_id(&rune().asset_id).unwrap(), RUNE_POOL_ID);
    }

    #[test]
    fn prices_in_rune() {
        let graph = PoolGraph::new(pools());
        assert_eq!(graph.price_in_rune(&eth().asset_id).unwrap(), dec!(2000));
        assert_eq!(graph.price_in_rune(&fox().asset_id).unwrap(), dec!(0.05));
        assert_eq!(graph.price_in_rune(&rune().asset_id).unwrap(), dec!(1));
    }

    #[test]
    fn missing_pool_is_pool_not_found() {
        let err = PoolGraph::default().price_in_rune(&btc().asset_id).unwrap_err();
        assert!(err.is(SwapErrorType::PoolNotFound));
    }
}
