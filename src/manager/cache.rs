//! Flag-keyed swapper manager cache

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use crate::{
    chain::AdapterManager,
    config::{Config, FeatureFlags},
    errors::{SwapError, SwapErrorType, SwapResult},
    swapper::Swapper,
    swappers::{CowSwapper, LifiSwapper, OsmosisSwapper, ThorchainSwapper, ZrxSwapper, zrx_chain},
    types::{ChainId, SwapperName, ETHEREUM_MAINNET},
};
use super::SwapperManager;

/// What venues need to be constructed.
#[derive(Clone)]
pub struct SwapperDeps {
    pub config: Config,
    pub adapters: AdapterManager,
}

async fn register(manager: &mut SwapperManager, name: SwapperName, swapper: SwapResult<Arc<dyn Swapper>>) {
    let swapper = match swapper {
        Ok(swapper) => swapper,
        Err(e) => {
            warn!("⚠️ {:?} not registered: {}", name, e);
            return;
        }
    };
    if let Err(e) = swapper.initialize().await {
        warn!("⚠️ {:?} failed to initialize: {}", name, e);
        return;
    }
    info!("✅ Registered {:?}", name);
    manager.add_swapper(swapper);
}

fn zrx(deps: &SwapperDeps, name: SwapperName, url: &str) -> SwapResult<Arc<dyn Swapper>> {
    let chain = zrx_chain(name)
        .ok_or_else(|| SwapError::new(SwapErrorType::UnsupportedChain, format!("{:?} is not a 0x venue", name)))?;
    let adapter = deps.adapters.require(&ChainId::from_raw(chain.chain_id))?;
    Ok(Arc::new(ZrxSwapper::new(name, adapter, url, deps.config.http_timeout)?))
}

/// Builds a registry holding every enabled venue. Venues that cannot be
/// constructed or initialized are left out.
pub async fn build_swapper_manager(flags: &FeatureFlags, deps: &SwapperDeps) -> SwapperManager {
    let config = &deps.config;
    let mut manager = SwapperManager::new();

    if flags.cow_swap {
        let cow = deps
            .adapters
            .require(&ChainId::from_raw(ETHEREUM_MAINNET))
            .and_then(|adapter| CowSwapper::new(adapter, &config.cowswap_api_url, config.http_timeout))
            .map(|swapper| Arc::new(swapper) as Arc<dyn Swapper>);
        register(&mut manager, SwapperName::CowSwap, cow).await;
    }

    let zrx_venues = [
        (flags.zrx_ethereum, SwapperName::ZrxEthereum, &config.zrx_ethereum_url),
        (flags.zrx_avalanche, SwapperName::ZrxAvalanche, &config.zrx_avalanche_url),
        (flags.zrx_optimism, SwapperName::ZrxOptimism, &config.zrx_optimism_url),
        (flags.zrx_bnb_smart_chain, SwapperName::ZrxBnbSmartChain, &config.zrx_bnb_smart_chain_url),
        (flags.zrx_polygon, SwapperName::ZrxPolygon, &config.zrx_polygon_url),
    ];
    for (enabled, name, url) in zrx_venues {
        if enabled {
            register(&mut manager, name, zrx(deps, name, url)).await;
        }
    }

    if flags.thorchain {
        let thorchain = ThorchainSwapper::new(
            deps.adapters.clone(),
            &config.thorchain_daemon_url,
            &config.midgard_url,
            config.http_timeout,
        )
        .map(|swapper| Arc::new(swapper) as Arc<dyn Swapper>);
        register(&mut manager, SwapperName::Thorchain, thorchain).await;
    }

    if flags.osmosis {
        let osmosis = OsmosisSwapper::new(
            deps.adapters.clone(),
            &config.osmosis_url,
            &config.cosmos_url,
            config.poll,
            config.settle_delay,
            config.http_timeout,
        )
        .map(|swapper| Arc::new(swapper) as Arc<dyn Swapper>);
        register(&mut manager, SwapperName::Osmosis, osmosis).await;
    }

    if flags.lifi {
        let lifi = LifiSwapper::new(deps.adapters.clone(), &config.lifi_api_url, config.http_timeout)
            .map(|swapper| Arc::new(swapper) as Arc<dyn Swapper>);
        register(&mut manager, SwapperName::Lifi, lifi).await;
    }

    manager
}

/// Hands out one shared manager per flag set. A flag change builds a fresh
/// registry and replaces the cached one.
#[derive(Default)]
pub struct SwapperManagerCache {
    cached: Mutex<Option<(FeatureFlags, Arc<SwapperManager>)>>,
}

impl SwapperManagerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_build(&self, flags: &FeatureFlags, deps: &SwapperDeps) -> Arc<SwapperManager> {
        let mut cached = self.cached.lock().await;
        if let Some((built_for, manager)) = cached.as_ref() {
            if built_for == flags {
                return manager.clone();
            }
        }

        let manager = Arc::new(build_swapper_manager(flags, deps).await);
        info!("🔧 Swapper manager built with {} venues", manager.len());
        *cached = Some((*flags, manager.clone()));
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swappers::thorchain::pools::fixtures::pools_json;
    use crate::test_utils::MockAdapter;
    use crate::types::{ATOM_ASSET_ID, COSMOS_HUB_MAINNET, OSMOSIS_MAINNET, OSMO_ASSET_ID};

    fn deps(url: &str) -> SwapperDeps {
        let mut config = Config::load();
        config.thorchain_daemon_url = url.to_string();
        config.midgard_url = url.to_string();
        config.osmosis_url = url.to_string();
        config.cosmos_url = url.to_string();
        config.cowswap_api_url = url.to_string();
        config.zrx_ethereum_url = url.to_string();
        config.lifi_api_url = url.to_string();

        let mut adapters = AdapterManager::new();
        adapters.insert(Arc::new(MockAdapter::cosmos(OSMOSIS_MAINNET, OSMO_ASSET_ID, "osmo1user")));
        adapters.insert(Arc::new(MockAdapter::cosmos(COSMOS_HUB_MAINNET, ATOM_ASSET_ID, "cosmos1user")));
        SwapperDeps { config, adapters }
    }

    #[tokio::test]
    async fn same_flags_share_one_manager() {
        let cache = SwapperManagerCache::new();
        let deps = deps("http://127.0.0.1:9");
        let flags = FeatureFlags {
            osmosis: true,
            ..Default::default()
        };

        let first = cache.get_or_build(&flags, &deps).await;
        let second = cache.get_or_build(&flags, &deps).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.names(), vec![SwapperName::Osmosis]);

        let rebuilt = cache.get_or_build(&FeatureFlags::default(), &deps).await;
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert!(rebuilt.is_empty());
    }

    #[tokio::test]
    async fn any_flag_change_rebuilds() {
        let cache = SwapperManagerCache::new();
        let deps = deps("http://127.0.0.1:9");
        let osmosis = FeatureFlags {
            osmosis: true,
            ..Default::default()
        };
        let osmosis_and_polygon = FeatureFlags {
            zrx_polygon: true,
            ..osmosis
        };

        let first = cache.get_or_build(&osmosis, &deps).await;
        let second = cache.get_or_build(&osmosis_and_polygon, &deps).await;
        // no Polygon adapter, so both registries hold the same venues
        assert_eq!(first.names(), second.names());
        assert!(!Arc::ptr_eq(&first, &second));

        let third = cache.get_or_build(&osmosis, &deps).await;
        assert!(!Arc::ptr_eq(&second, &third));
        assert!(Arc::ptr_eq(&third, &cache.get_or_build(&osmosis, &deps).await));
    }

    #[tokio::test]
    async fn thorchain_is_initialized_before_registration() {
        let mut server = mockito::Server::new_async().await;
        let pools = server
            .mock("GET", "/lcd/thorchain/pools")
            .with_body(pools_json())
            .create_async()
            .await;
        let flags = FeatureFlags {
            thorchain: true,
            ..Default::default()
        };

        let manager = build_swapper_manager(&flags, &deps(&server.url())).await;
        assert_eq!(manager.names(), vec![SwapperName::Thorchain]);
        pools.assert_async().await;
    }

    #[tokio::test]
    async fn venues_that_fail_to_start_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lcd/thorchain/pools")
            .with_status(503)
            .create_async()
            .await;
        // no Ethereum adapter for CoW Swap or 0x
        let flags = FeatureFlags {
            cow_swap: true,
            zrx_ethereum: true,
            thorchain: true,
            osmosis: true,
            ..Default::default()
        };

        let manager = build_swapper_manager(&flags, &deps(&server.url())).await;
        assert_eq!(manager.names(), vec![SwapperName::Osmosis]);
    }

    #[tokio::test]
    async fn evm_venues_register_with_an_ethereum_adapter() {
        let mut deps = deps("http://127.0.0.1:9");
        deps.adapters.insert(Arc::new(MockAdapter::evm(ETHEREUM_MAINNET)));
        let flags = FeatureFlags {
            cow_swap: true,
            zrx_ethereum: true,
            zrx_polygon: true,
            ..Default::default()
        };

        let manager = build_swapper_manager(&flags, &deps).await;
        assert_eq!(manager.names(), vec![SwapperName::CowSwap, SwapperName::ZrxEthereum]);
    }

    #[tokio::test]
    async fn lifi_loads_its_catalog_before_registration() {
        let mut server = mockito::Server::new_async().await;
        let chains = server
            .mock("GET", "/v1/chains")
            .with_body(r#"{"chains":[{"id":1,"key":"eth"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/tokens")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"tokens":{"1":[{"address":"0x0000000000000000000000000000000000000000","priceUSD":"2000"}]}}"#)
            .create_async()
            .await;
        let mut deps = deps(&server.url());
        deps.adapters.insert(Arc::new(MockAdapter::evm(ETHEREUM_MAINNET)));
        let flags = FeatureFlags {
            lifi: true,
            ..Default::default()
        };

        let manager = build_swapper_manager(&flags, &deps).await;
        assert_eq!(manager.names(), vec![SwapperName::Lifi]);
        chains.assert_async().await;
    }
}
