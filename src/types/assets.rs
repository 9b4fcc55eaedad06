//! Asset metadata and well-known chain/asset identifiers

use alloy::primitives::{Address, address};
use serde::{Deserialize, Serialize};
use super::{AssetId, ChainId};

// Chain ids
pub const ETHEREUM_MAINNET: &str = "eip155:1";
pub const OPTIMISM_MAINNET: &str = "eip155:10";
pub const BNB_SMART_CHAIN_MAINNET: &str = "eip155:56";
pub const POLYGON_MAINNET: &str = "eip155:137";
pub const AVALANCHE_MAINNET: &str = "eip155:43114";
pub const BITCOIN_MAINNET: &str = "bip122:000000000019d6689c085ae165831e93";
pub const COSMOS_HUB_MAINNET: &str = "cosmos:cosmoshub-4";
pub const OSMOSIS_MAINNET: &str = "cosmos:osmosis-1";
pub const THORCHAIN_MAINNET: &str = "cosmos:thorchain-mainnet-v1";

// Native fee asset ids
pub const ETH_ASSET_ID: &str = "eip155:1/slip44:60";
pub const AVAX_ASSET_ID: &str = "eip155:43114/slip44:60";
pub const OPTIMISM_ETH_ASSET_ID: &str = "eip155:10/slip44:60";
pub const BNB_ASSET_ID: &str = "eip155:56/slip44:60";
pub const MATIC_ASSET_ID: &str = "eip155:137/slip44:60";
pub const BTC_ASSET_ID: &str = "bip122:000000000019d6689c085ae165831e93/slip44:0";
pub const ATOM_ASSET_ID: &str = "cosmos:cosmoshub-4/slip44:118";
pub const OSMO_ASSET_ID: &str = "cosmos:osmosis-1/slip44:118";
pub const RUNE_ASSET_ID: &str = "cosmos:thorchain-mainnet-v1/slip44:931";

// Ethereum mainnet tokens
pub const WETH_MAINNET: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
pub const USDC_MAINNET: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
pub const FOX_MAINNET: Address = address!("c770eefad204b5180df6a14ee197d99d808ee52d");
pub const WBTC_MAINNET: Address = address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599");

/// Placeholder address venues use for the chain's native asset.
pub const NATIVE_TOKEN_PLACEHOLDER: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: AssetId,
    pub chain_id: ChainId,
    pub symbol: String,
    pub name: String,
    pub precision: u32,
}

impl Asset {
    pub fn new(asset_id: AssetId, symbol: &str, name: &str, precision: u32) -> Self {
        Self {
            chain_id: asset_id.chain_id(),
            asset_id,
            symbol: symbol.to_string(),
            name: name.to_string(),
            precision,
        }
    }

    pub fn erc20(chain_id: &str, contract: Address, symbol: &str, name: &str, precision: u32) -> Self {
        Self::new(
            AssetId::from_raw(format!("{}/erc20:{:#x}", chain_id, contract)),
            symbol,
            name,
            precision,
        )
    }

    /// Token contract for `erc20` assets.
    pub fn erc20_address(&self) -> Option<Address> {
        if !self.asset_id.is_erc20() {
            return None;
        }
        self.asset_id.asset_reference().parse().ok()
    }
}

pub fn eth() -> Asset {
    Asset::new(AssetId::from_raw(ETH_ASSET_ID), "ETH", "Ethereum", 18)
}

pub fn weth() -> Asset {
    Asset::erc20(ETHEREUM_MAINNET, WETH_MAINNET, "WETH", "Wrapped Ether", 18)
}

pub fn usdc() -> Asset {
    Asset::erc20(ETHEREUM_MAINNET, USDC_MAINNET, "USDC", "USD Coin", 6)
}

pub fn fox() -> Asset {
    Asset::erc20(ETHEREUM_MAINNET, FOX_MAINNET, "FOX", "Fox", 18)
}

pub fn wbtc() -> Asset {
    Asset::erc20(ETHEREUM_MAINNET, WBTC_MAINNET, "WBTC", "Wrapped Bitcoin", 8)
}

pub fn btc() -> Asset {
    Asset::new(AssetId::from_raw(BTC_ASSET_ID), "BTC", "Bitcoin", 8)
}

pub fn atom() -> Asset {
    Asset::new(AssetId::from_raw(ATOM_ASSET_ID), "ATOM", "Cosmos", 6)
}

pub fn osmo() -> Asset {
    Asset::new(AssetId::from_raw(OSMO_ASSET_ID), "OSMO", "Osmosis", 6)
}

pub fn rune() -> Asset {
    Asset::new(AssetId::from_raw(RUNE_ASSET_ID), "RUNE", "THORChain", 8)
}

/// Assets the binary can quote by id.
pub fn known_assets() -> Vec<Asset> {
    vec![eth(), weth(), usdc(), fox(), wbtc(), btc(), atom(), osmo(), rune()]
}

pub fn find_asset(asset_id: &str) -> Option<Asset> {
    let asset_id = asset_id.to_lowercase();
    known_assets()
        .into_iter()
        .find(|asset| asset.asset_id.as_str().to_lowercase() == asset_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_assets_ignoring_address_case() {
        let found = find_asset("eip155:1/erc20:0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap();
        assert_eq!(found.symbol, "USDC");
        assert_eq!(found.precision, 6);
        assert!(find_asset("eip155:1/erc20:0x0000000000000000000000000000000000000001").is_none());
    }
}
