//! EVM chain adapter over an alloy provider

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::eth::TransactionRequest,
};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use crate::{
    chain::{
        Account, BuildSendTxInput, ChainAdapter, EvmChainAdapter, FeeDataEstimate, FeeDataInput, FeeEstimate,
        TxHistoryEntry, TxKind, UnsignedTx, Wallet,
    },
    errors::{SwapError, SwapErrorType, SwapResult, SwapResultExt},
    types::{AssetId, ChainId},
    ConcreteProvider,
};

/// Connects over HTTP and checks the endpoint answers with the expected chain.
pub async fn setup_provider(rpc_url: &str) -> SwapResult<Arc<ConcreteProvider>> {
    let url = rpc_url
        .parse::<alloy::transports::http::reqwest::Url>()
        .swap_err(SwapErrorType::ValidationFailed, "invalid RPC url")?;
    let provider: Arc<ConcreteProvider> = Arc::new(ProviderBuilder::new().on_http(url).boxed());

    let block = provider
        .get_block_number()
        .await
        .swap_err(SwapErrorType::ResponseError, "failed to reach RPC endpoint")?;
    info!("✅ Connected to {} at block {}", rpc_url, block);
    Ok(provider)
}

pub struct AlloyEvmAdapter {
    provider: Arc<ConcreteProvider>,
    evm_chain_id: u64,
    fee_asset_id: AssetId,
}

impl AlloyEvmAdapter {
    pub fn new(provider: Arc<ConcreteProvider>, evm_chain_id: u64, fee_asset_id: AssetId) -> Self {
        Self {
            provider,
            evm_chain_id,
            fee_asset_id,
        }
    }

    pub async fn connect(rpc_url: &str, fee_asset_id: AssetId) -> SwapResult<Self> {
        let provider = setup_provider(rpc_url).await?;
        let evm_chain_id = provider
            .get_chain_id()
            .await
            .swap_err(SwapErrorType::ResponseError, "failed to read chain id")?;
        Ok(Self::new(provider, evm_chain_id, fee_asset_id))
    }
}

fn parse_address(value: &str) -> SwapResult<Address> {
    Address::from_str(value).map_err(|e| {
        SwapError::new(SwapErrorType::ValidationFailed, format!("invalid EVM address: {}", value)).with_cause(e)
    })
}

#[async_trait]
impl ChainAdapter for AlloyEvmAdapter {
    fn chain_id(&self) -> ChainId {
        ChainId::new("eip155", &self.evm_chain_id.to_string())
    }

    fn fee_asset_id(&self) -> AssetId {
        self.fee_asset_id.clone()
    }

    async fn get_address(&self, wallet: &dyn Wallet, _account_number: u32) -> SwapResult<String> {
        wallet
            .evm_address()
            .map(|address| address.to_string())
            .ok_or_else(|| SwapError::new(SwapErrorType::ValidationFailed, "wallet has no EVM account"))
    }

    async fn get_fee_data(&self, input: &FeeDataInput) -> SwapResult<FeeDataEstimate> {
        let mut request = TransactionRequest::default()
            .with_to(parse_address(&input.to)?)
            .with_value(input.value);
        if let Some(from) = &input.from {
            request = request.with_from(parse_address(from)?);
        }
        if let Some(data) = &input.data {
            request = request.with_input(data.clone());
        }

        let gas_limit = self
            .provider
            .estimate_gas(&request)
            .await
            .swap_err(SwapErrorType::ResponseError, "gas estimation failed")?;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .swap_err(SwapErrorType::ResponseError, "gas price unavailable")?;

        let gas_limit = U256::from(gas_limit);
        let at = |numerator: u128| {
            let price = U256::from(gas_price * numerator / 10);
            FeeEstimate {
                tx_fee: price * gas_limit,
                gas_limit: Some(gas_limit),
                gas_price: Some(price),
            }
        };
        Ok(FeeDataEstimate {
            slow: at(8),
            average: at(10),
            fast: at(12),
        })
    }

    async fn get_account(&self, address: &str) -> SwapResult<Account> {
        let balance = self
            .provider
            .get_balance(parse_address(address)?)
            .await
            .swap_err(SwapErrorType::ResponseError, "balance lookup failed")?;
        Ok(Account {
            address: address.to_string(),
            balance,
            tokens: Default::default(),
        })
    }

    async fn build_send_transaction(&self, input: &BuildSendTxInput, wallet: &dyn Wallet) -> SwapResult<UnsignedTx> {
        let from = wallet
            .evm_address()
            .ok_or_else(|| SwapError::new(SwapErrorType::ValidationFailed, "wallet has no EVM account"))?;
        let nonce = self
            .provider
            .get_transaction_count(from)
            .await
            .swap_err(SwapErrorType::ResponseError, "nonce lookup failed")?;

        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(parse_address(&input.to)?)
            .with_value(input.value)
            .with_nonce(nonce)
            .with_chain_id(self.evm_chain_id);

        let request = match &input.kind {
            TxKind::EvmCall { data, gas_limit, gas_price } => request
                .with_input(data.clone())
                .with_gas_limit(gas_limit.saturating_to::<u64>())
                .with_gas_price(gas_price.saturating_to::<u128>()),
            TxKind::Send => {
                let gas_price = self
                    .provider
                    .get_gas_price()
                    .await
                    .swap_err(SwapErrorType::ResponseError, "gas price unavailable")?;
                request.with_gas_limit(21_000).with_gas_price(gas_price)
            }
            other => {
                return Err(SwapError::new(
                    SwapErrorType::UnsupportedChain,
                    format!("{:?} is not an EVM transaction", other),
                ))
            }
        };
        Ok(UnsignedTx::Evm(request))
    }

    async fn sign_transaction(&self, tx: UnsignedTx, wallet: &dyn Wallet) -> SwapResult<String> {
        match tx {
            UnsignedTx::Evm(request) => {
                let signed = wallet.sign_evm_transaction(request).await?;
                Ok(signed.to_string())
            }
            UnsignedTx::Opaque { chain_id, .. } => Err(SwapError::new(
                SwapErrorType::ValidationFailed,
                format!("cannot sign a {} transaction on an EVM adapter", chain_id),
            )),
        }
    }

    async fn broadcast_transaction(&self, signed_tx: &str) -> SwapResult<String> {
        let raw = Bytes::from_str(signed_tx).swap_err(SwapErrorType::ValidationFailed, "signed tx is not hex")?;
        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| {
                warn!("⚠️ Broadcast failed: {}", e);
                SwapError::new(SwapErrorType::ResponseError, "broadcast failed").with_cause(e)
            })?;
        Ok(pending.tx_hash().to_string())
    }

    async fn get_tx_history(&self, _address: &str) -> SwapResult<Vec<TxHistoryEntry>> {
        Err(SwapError::new(
            SwapErrorType::ResponseError,
            "transaction history requires an indexer, not a plain RPC node",
        ))
    }

    fn as_evm(&self) -> Option<&dyn EvmChainAdapter> {
        Some(self)
    }
}

#[async_trait]
impl EvmChainAdapter for AlloyEvmAdapter {
    fn evm_chain_id(&self) -> u64 {
        self.evm_chain_id
    }

    async fn call(&self, to: Address, data: Bytes) -> SwapResult<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider
            .call(&tx)
            .await
            .swap_err(SwapErrorType::ResponseError, "contract call failed")
    }
}
