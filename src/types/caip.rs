//! CAIP-2 chain ids and CAIP-19 asset ids

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::errors::{SwapError, SwapErrorType, SwapResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainNamespace {
    Evm,
    Cosmos,
    Utxo,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(namespace: &str, reference: &str) -> Self {
        Self(format!("{}:{}", namespace, reference))
    }

    /// For ids known to be well formed, such as the constants in `assets`.
    pub(crate) fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> SwapResult<ChainNamespace> {
        match self.0.split_once(':').map(|(ns, _)| ns) {
            Some("eip155") => Ok(ChainNamespace::Evm),
            Some("cosmos") => Ok(ChainNamespace::Cosmos),
            Some("bip122") => Ok(ChainNamespace::Utxo),
            _ => Err(SwapError::new(
                SwapErrorType::UnsupportedNamespace,
                format!("unknown chain namespace in {}", self.0),
            )),
        }
    }

    pub fn reference(&self) -> &str {
        self.0.split_once(':').map(|(_, r)| r).unwrap_or_default()
    }

    /// Numeric chain id for `eip155` chains.
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self.0.split_once(':') {
            Some(("eip155", reference)) => reference.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChainId {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ns, reference)) if !ns.is_empty() && !reference.is_empty() => Ok(Self(s.to_string())),
            _ => Err(SwapError::new(
                SwapErrorType::ValidationFailed,
                format!("invalid chain id: {}", s),
            )),
        }
    }
}

/// `<chain id>/<asset namespace>:<asset reference>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(chain_id: &ChainId, asset_namespace: &str, asset_reference: &str) -> Self {
        Self(format!("{}/{}:{}", chain_id, asset_namespace, asset_reference))
    }

    /// For compile-time known ids; no validation.
    pub(crate) fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn chain_id(&self) -> ChainId {
        let chain = self.0.split_once('/').map(|(c, _)| c).unwrap_or(&self.0);
        ChainId(chain.to_string())
    }

    pub fn asset_namespace(&self) -> &str {
        self.asset_part().0
    }

    pub fn asset_reference(&self) -> &str {
        self.asset_part().1
    }

    pub fn is_erc20(&self) -> bool {
        self.asset_namespace() == "erc20"
    }

    fn asset_part(&self) -> (&str, &str) {
        self.0
            .split_once('/')
            .and_then(|(_, asset)| asset.split_once(':'))
            .unwrap_or(("", ""))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetId {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s
            .split_once('/')
            .map(|(chain, asset)| chain.contains(':') && asset.contains(':'))
            .unwrap_or(false);
        if !valid {
            return Err(SwapError::new(
                SwapErrorType::ValidationFailed,
                format!("invalid asset id: {}", s),
            ));
        }
        // erc20 references are case-insensitive addresses
        let normalized = match s.split_once("/erc20:") {
            Some((chain, reference)) => format!("{}/erc20:{}", chain, reference.to_lowercase()),
            None => s.to_string(),
        };
        Ok(Self(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_erc20_asset_id_parts() {
        let id: AssetId = "eip155:1/erc20:0xC770EEFAD204B5180DF6A14EE197D99D808EE52D".parse().unwrap();
        assert_eq!(id.chain_id().as_str(), "eip155:1");
        assert_eq!(id.asset_namespace(), "erc20");
        assert_eq!(id.asset_reference(), "0xc770eefad204b5180df6a14ee197d99d808ee52d");
        assert!(id.is_erc20());
        assert_eq!(id.chain_id().evm_chain_id(), Some(1));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("eip155:1".parse::<AssetId>().is_err());
        assert!("nonsense".parse::<ChainId>().is_err());
    }

    #[test]
    fn cosmos_chain_namespace() {
        let chain: ChainId = "cosmos:osmosis-1".parse().unwrap();
        assert_eq!(chain.namespace().unwrap(), ChainNamespace::Cosmos);
        assert_eq!(chain.reference(), "osmosis-1");
        assert_eq!(chain.evm_chain_id(), None);
    }
}
