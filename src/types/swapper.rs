//! Venue naming and source attribution

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry key of a venue. 0x runs one instance per EVM chain, each with
/// its own key, but all of them display as `0x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SwapperName {
    #[serde(rename = "CoW Swap")]
    CowSwap,
    ZrxEthereum,
    ZrxAvalanche,
    ZrxOptimism,
    ZrxBnbSmartChain,
    ZrxPolygon,
    #[serde(rename = "THORChain")]
    Thorchain,
    Osmosis,
    #[serde(rename = "LI.FI")]
    Lifi,
}

impl fmt::Display for SwapperName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapperName::CowSwap => "CoW Swap",
            SwapperName::ZrxEthereum
            | SwapperName::ZrxAvalanche
            | SwapperName::ZrxOptimism
            | SwapperName::ZrxBnbSmartChain
            | SwapperName::ZrxPolygon => "0x",
            SwapperName::Thorchain => "THORChain",
            SwapperName::Osmosis => "Osmosis",
            SwapperName::Lifi => "LI.FI",
        };
        f.write_str(name)
    }
}

/// Share of a trade routed through one liquidity source inside a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapSource {
    pub name: String,
    pub proportion: Decimal,
}

impl SwapSource {
    pub fn whole(name: impl Into<String>) -> Vec<SwapSource> {
        vec![SwapSource {
            name: name.into(),
            proportion: Decimal::ONE,
        }]
    }
}
