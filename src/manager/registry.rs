//! Venue registry keyed by swapper name

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use crate::{
    errors::{SwapError, SwapErrorType, SwapResult},
    swapper::Swapper,
    types::{AssetId, SwapperName},
};

#[derive(Clone, Default)]
pub struct SwapperManager {
    swappers: BTreeMap<SwapperName, Arc<dyn Swapper>>,
}

impl SwapperManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `swapper`, replacing any venue registered under the same name.
    pub fn add_swapper(&mut self, swapper: Arc<dyn Swapper>) -> &mut Self {
        let name = swapper.name();
        if self.swappers.insert(name, swapper).is_some() {
            debug!("Replaced swapper {:?}", name);
        }
        self
    }

    pub fn remove_swapper(&mut self, name: SwapperName) -> SwapResult<Arc<dyn Swapper>> {
        self.swappers.remove(&name).ok_or_else(|| Self::not_found(name))
    }

    pub fn get_swapper(&self, name: SwapperName) -> SwapResult<Arc<dyn Swapper>> {
        self.swappers.get(&name).cloned().ok_or_else(|| Self::not_found(name))
    }

    pub fn swappers(&self) -> Vec<Arc<dyn Swapper>> {
        self.swappers.values().cloned().collect()
    }

    pub fn names(&self) -> Vec<SwapperName> {
        self.swappers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.swappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swappers.is_empty()
    }

    /// Venues that can sell `sell_asset_id` into `buy_asset_id`.
    pub fn get_swappers_by_pair(&self, sell_asset_id: &AssetId, buy_asset_id: &AssetId) -> Vec<Arc<dyn Swapper>> {
        let buy = std::slice::from_ref(buy_asset_id);
        self.swappers
            .values()
            .filter(|swapper| !swapper.filter_buy_assets_by_sell_asset_id(sell_asset_id, buy).is_empty())
            .cloned()
            .collect()
    }

    /// Union of every venue's buy filter, in `asset_ids` order.
    pub fn get_supported_buy_asset_ids_from_sell_id(&self, sell_asset_id: &AssetId, asset_ids: &[AssetId]) -> Vec<AssetId> {
        let supported: Vec<Vec<AssetId>> = self
            .swappers
            .values()
            .map(|swapper| swapper.filter_buy_assets_by_sell_asset_id(sell_asset_id, asset_ids))
            .collect();
        union_in_order(asset_ids, &supported)
    }

    /// Union of every venue's sellable filter, in `asset_ids` order.
    pub fn get_supported_sellable_asset_ids(&self, asset_ids: &[AssetId]) -> Vec<AssetId> {
        let supported: Vec<Vec<AssetId>> = self
            .swappers
            .values()
            .map(|swapper| swapper.filter_asset_ids_by_sellable(asset_ids))
            .collect();
        union_in_order(asset_ids, &supported)
    }

    fn not_found(name: SwapperName) -> SwapError {
        SwapError::new(SwapErrorType::ValidationFailed, format!("swapper {:?} is not registered", name))
            .with_details(serde_json::json!({ "swapperName": name }))
    }
}

fn union_in_order(asset_ids: &[AssetId], supported: &[Vec<AssetId>]) -> Vec<AssetId> {
    let mut union: Vec<AssetId> = Vec::new();
    for id in asset_ids {
        if !union.contains(id) && supported.iter().any(|ids| ids.contains(id)) {
            union.push(id.clone());
        }
    }
    union
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockSwapper;
    use crate::types::{atom, eth, fox, osmo, rune, usdc};

    fn manager() -> SwapperManager {
        let mut manager = SwapperManager::new();
        manager
            .add_swapper(Arc::new(MockSwapper::new(
                SwapperName::ZrxEthereum,
                vec![eth().asset_id, fox().asset_id, usdc().asset_id],
            )))
            .add_swapper(Arc::new(MockSwapper::new(
                SwapperName::Osmosis,
                vec![atom().asset_id, osmo().asset_id],
            )));
        manager
    }

    #[test]
    fn add_get_remove() {
        let mut manager = manager();
        assert_eq!(manager.names(), vec![SwapperName::ZrxEthereum, SwapperName::Osmosis]);
        assert_eq!(manager.get_swapper(SwapperName::Osmosis).unwrap().name(), SwapperName::Osmosis);

        manager.remove_swapper(SwapperName::Osmosis).unwrap();
        assert_eq!(manager.len(), 1);
        let err = manager.get_swapper(SwapperName::Osmosis).err().unwrap();
        assert!(err.is(SwapErrorType::ValidationFailed));
        assert!(manager.remove_swapper(SwapperName::Osmosis).is_err());
    }

    #[test]
    fn adding_same_name_replaces() {
        let mut manager = manager();
        manager.add_swapper(Arc::new(MockSwapper::new(SwapperName::Osmosis, vec![])));
        assert_eq!(manager.len(), 2);
        assert!(manager.get_swappers_by_pair(&atom().asset_id, &osmo().asset_id).is_empty());
    }

    #[test]
    fn swappers_by_pair() {
        let manager = manager();
        let found = manager.get_swappers_by_pair(&eth().asset_id, &fox().asset_id);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), SwapperName::ZrxEthereum);
        assert!(manager.get_swappers_by_pair(&eth().asset_id, &atom().asset_id).is_empty());
    }

    #[test]
    fn filters_are_unions() {
        let manager = manager();
        let ids = vec![atom().asset_id, eth().asset_id, fox().asset_id, osmo().asset_id, usdc().asset_id];

        assert_eq!(
            manager.get_supported_buy_asset_ids_from_sell_id(&eth().asset_id, &ids),
            vec![fox().asset_id, usdc().asset_id]
        );
        assert_eq!(manager.get_supported_sellable_asset_ids(&ids), ids);
        assert!(manager.get_supported_buy_asset_ids_from_sell_id(&rune().asset_id, &ids).is_empty());
    }
}
