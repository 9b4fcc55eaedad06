//! Chain adapter and wallet seams

use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::eth::TransactionRequest;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use crate::errors::{SwapError, SwapErrorType, SwapResult};
use crate::types::{AssetId, ChainId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeEstimate {
    pub tx_fee: U256,
    pub gas_limit: Option<U256>,
    pub gas_price: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeDataEstimate {
    pub slow: FeeEstimate,
    pub average: FeeEstimate,
    pub fast: FeeEstimate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeDataInput {
    pub to: String,
    pub value: U256,
    pub from: Option<String>,
    pub data: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub address: String,
    pub balance: U256,
    /// Token balances keyed by denom or asset id.
    pub tokens: HashMap<String, U256>,
}

/// What the transaction should do besides moving `value` to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxKind {
    Send,
    EvmCall {
        data: Bytes,
        gas_limit: U256,
        gas_price: U256,
    },
    IbcTransfer {
        source_port: String,
        source_channel: String,
        denom: String,
    },
    OsmosisSwap {
        pool_id: u64,
        token_in_denom: String,
        token_out_denom: String,
        token_out_min_amount: U256,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSendTxInput {
    pub to: String,
    pub value: U256,
    pub account_number: u32,
    pub memo: Option<String>,
    pub kind: TxKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnsignedTx {
    Evm(TransactionRequest),
    /// Adapter specific sign doc for non-EVM chains.
    Opaque {
        chain_id: ChainId,
        body: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxHistoryEntry {
    pub txid: String,
    pub memo: Option<String>,
    pub status_ok: bool,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    fn supports_offline_signing(&self) -> bool;
    fn supports_broadcast(&self) -> bool;
    fn evm_address(&self) -> Option<Address>;
    /// Returns the EIP-2718 encoded signed transaction.
    async fn sign_evm_transaction(&self, tx: TransactionRequest) -> SwapResult<Bytes>;
    /// Returns a 65 byte `r || s || v` signature over `hash`.
    async fn sign_evm_hash(&self, hash: B256) -> SwapResult<Bytes>;
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain_id(&self) -> ChainId;
    fn fee_asset_id(&self) -> AssetId;

    async fn get_address(&self, wallet: &dyn Wallet, account_number: u32) -> SwapResult<String>;
    async fn get_fee_data(&self, input: &FeeDataInput) -> SwapResult<FeeDataEstimate>;
    async fn get_account(&self, address: &str) -> SwapResult<Account>;
    async fn build_send_transaction(&self, input: &BuildSendTxInput, wallet: &dyn Wallet) -> SwapResult<UnsignedTx>;
    async fn sign_transaction(&self, tx: UnsignedTx, wallet: &dyn Wallet) -> SwapResult<String>;
    async fn broadcast_transaction(&self, signed_tx: &str) -> SwapResult<String>;
    async fn get_tx_history(&self, address: &str) -> SwapResult<Vec<TxHistoryEntry>>;

    fn supports_sign_and_broadcast(&self) -> bool {
        false
    }

    async fn sign_and_broadcast_transaction(&self, _tx: UnsignedTx, _wallet: &dyn Wallet) -> SwapResult<String> {
        Err(SwapError::new(
            SwapErrorType::SignAndBroadcastFailed,
            format!("{} cannot sign and broadcast in one step", self.chain_id()),
        ))
    }

    fn as_evm(&self) -> Option<&dyn EvmChainAdapter> {
        None
    }
}

#[async_trait]
pub trait EvmChainAdapter: ChainAdapter {
    fn evm_chain_id(&self) -> u64;
    /// `eth_call` against `to`.
    async fn call(&self, to: Address, data: Bytes) -> SwapResult<Bytes>;
}

/// Signs offline and broadcasts when the wallet can, otherwise hands the
/// transaction to the wallet to sign and broadcast in one step.
pub async fn sign_and_send(adapter: &dyn ChainAdapter, wallet: &dyn Wallet, tx: UnsignedTx) -> SwapResult<String> {
    if wallet.supports_offline_signing() {
        let signed = adapter.sign_transaction(tx, wallet).await?;
        let txid = adapter.broadcast_transaction(&signed).await?;
        debug!("broadcast {} on {}", txid, adapter.chain_id());
        Ok(txid)
    } else if wallet.supports_broadcast() && adapter.supports_sign_and_broadcast() {
        adapter.sign_and_broadcast_transaction(tx, wallet).await
    } else {
        Err(SwapError::new(
            SwapErrorType::SignAndBroadcastFailed,
            "wallet supports neither offline signing nor broadcast",
        ))
    }
}

#[derive(Clone, Default)]
pub struct AdapterManager {
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl AdapterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, adapter: Arc<dyn ChainAdapter>) {
        self.adapters.insert(adapter.chain_id(), adapter);
    }

    pub fn get(&self, chain_id: &ChainId) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters.get(chain_id).cloned()
    }

    pub fn require(&self, chain_id: &ChainId) -> SwapResult<Arc<dyn ChainAdapter>> {
        self.get(chain_id).ok_or_else(|| {
            SwapError::new(SwapErrorType::UnsupportedChain, format!("no adapter for chain {}", chain_id))
                .with_details(serde_json::json!({ "chainId": chain_id.as_str() }))
        })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockAdapter, MockWallet};
    use crate::types::ETHEREUM_MAINNET;

    fn evm_tx() -> UnsignedTx {
        UnsignedTx::Evm(TransactionRequest::default())
    }

    #[tokio::test]
    async fn offline_signer_signs_then_broadcasts() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET);
        let txid = sign_and_send(&adapter, &MockWallet::offline(), evm_tx()).await.unwrap();
        assert_eq!(txid, "0xbroadcast");
        assert_eq!(adapter.broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn broadcast_only_wallet_uses_sign_and_broadcast() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET).with_sign_and_broadcast();
        let txid = sign_and_send(&adapter, &MockWallet::broadcast_only(), evm_tx()).await.unwrap();
        assert_eq!(txid, "0xsignedandbroadcast");
        assert!(adapter.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn wallet_without_capabilities_fails() {
        let adapter = MockAdapter::evm(ETHEREUM_MAINNET);
        let err = sign_and_send(&adapter, &MockWallet::incapable(), evm_tx()).await.unwrap_err();
        assert!(err.is(SwapErrorType::SignAndBroadcastFailed));
    }

    #[test]
    fn missing_adapter_is_unsupported_chain() {
        let manager = AdapterManager::new();
        let err = manager.require(&ChainId::from_raw(ETHEREUM_MAINNET)).err().unwrap();
        assert!(err.is(SwapErrorType::UnsupportedChain));
    }
}
