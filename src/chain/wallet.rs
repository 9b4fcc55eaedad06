//! Local private-key wallet

use alloy::{
    eips::eip2718::Encodable2718,
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, B256, Bytes},
    rpc::types::eth::TransactionRequest,
    signers::{local::PrivateKeySigner, Signer},
};
use async_trait::async_trait;
use std::str::FromStr;
use crate::chain::Wallet;
use crate::errors::{SwapErrorType, SwapResult, SwapResultExt};

/// Signs offline with a key held in memory. Cannot broadcast by itself.
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_private_key(private_key: &str) -> SwapResult<Self> {
        let signer = PrivateKeySigner::from_str(private_key)
            .swap_err(SwapErrorType::ValidationFailed, "failed to parse private key")?;
        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    fn supports_offline_signing(&self) -> bool {
        true
    }

    fn supports_broadcast(&self) -> bool {
        false
    }

    fn evm_address(&self) -> Option<Address> {
        Some(self.signer.address())
    }

    async fn sign_evm_transaction(&self, tx: TransactionRequest) -> SwapResult<Bytes> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let envelope = tx
            .build(&wallet)
            .await
            .swap_err(SwapErrorType::SignAndBroadcastFailed, "failed to sign transaction")?;
        Ok(envelope.encoded_2718().into())
    }

    async fn sign_evm_hash(&self, hash: B256) -> SwapResult<Bytes> {
        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .swap_err(SwapErrorType::SignAndBroadcastFailed, "failed to sign hash")?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}
