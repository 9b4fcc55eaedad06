//! In-crate fakes for chain adapters and wallets

use alloy::primitives::{address, Address, B256, Bytes, U256};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::chain::{
    Account, BuildSendTxInput, ChainAdapter, EvmChainAdapter, FeeDataEstimate, FeeDataInput, FeeEstimate,
    TxHistoryEntry, UnsignedTx, Wallet,
};
use crate::errors::{SwapError, SwapErrorType, SwapResult};
use crate::swapper::Swapper;
use crate::types::{
    ApprovalNeeded, Asset, AssetId, BuildTradeInput, ChainId, GetTradeQuoteInput, MinMax, QuoteFeeData, SwapSource,
    SwapperName, Trade, TradeQuote, TradeResult, TradeTxs,
};
use rust_decimal::Decimal;

pub const WALLET_ADDRESS: Address = address!("0000000000000000000000000000000000000011");

#[derive(Clone)]
pub enum CallReply {
    Allowance(U256),
    Empty,
    Fail,
}

pub struct MockAdapter {
    chain_id: ChainId,
    fee_asset_id: AssetId,
    evm: bool,
    address: String,
    sign_and_broadcast: bool,
    fee_data: FeeDataEstimate,
    call_replies: Mutex<VecDeque<CallReply>>,
    calls: AtomicUsize,
    accounts: Mutex<VecDeque<Account>>,
    txids: Mutex<VecDeque<String>>,
    tx_history: Vec<TxHistoryEntry>,
    built: Mutex<Vec<BuildSendTxInput>>,
    broadcasts: Mutex<Vec<String>>,
}

impl MockAdapter {
    fn base(chain_id: &str, fee_asset: &str, evm: bool) -> Self {
        Self {
            chain_id: ChainId::from_raw(chain_id),
            fee_asset_id: AssetId::from_raw(fee_asset),
            evm,
            address: format!("{:#x}", WALLET_ADDRESS),
            sign_and_broadcast: false,
            fee_data: fee_data(U256::from(79_036_500_000u64), U256::from(100_000u64)),
            call_replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            accounts: Mutex::new(VecDeque::new()),
            txids: Mutex::new(VecDeque::new()),
            tx_history: Vec::new(),
            built: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn evm(chain_id: &str) -> Self {
        let fee_asset = format!("{}/slip44:60", chain_id);
        Self::base(chain_id, &fee_asset, true)
    }

    pub fn cosmos(chain_id: &str, fee_asset: &str, address: &str) -> Self {
        let mut adapter = Self::base(chain_id, fee_asset, false);
        adapter.address = address.to_string();
        adapter
    }

    pub fn with_sign_and_broadcast(mut self) -> Self {
        self.sign_and_broadcast = true;
        self
    }

    pub fn with_fee_data(mut self, gas_price: U256, gas_limit: U256) -> Self {
        self.fee_data = fee_data(gas_price, gas_limit);
        self
    }

    /// Replies served in order; the last one repeats.
    pub fn with_call_replies(self, replies: Vec<CallReply>) -> Self {
        *self.call_replies.lock().unwrap() = replies.into();
        self
    }

    pub fn with_allowance(self, allowance: U256) -> Self {
        self.with_call_replies(vec![CallReply::Allowance(allowance)])
    }

    pub fn with_accounts(self, accounts: Vec<Account>) -> Self {
        *self.accounts.lock().unwrap() = accounts.into();
        self
    }

    pub fn with_txids(self, txids: &[&str]) -> Self {
        *self.txids.lock().unwrap() = txids.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_tx_history(mut self, history: Vec<TxHistoryEntry>) -> Self {
        self.tx_history = history;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn built(&self) -> Vec<BuildSendTxInput> {
        self.built.lock().unwrap().clone()
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn fee_data(gas_price: U256, gas_limit: U256) -> FeeDataEstimate {
    let estimate = FeeEstimate {
        tx_fee: gas_price * gas_limit,
        gas_limit: Some(gas_limit),
        gas_price: Some(gas_price),
    };
    FeeDataEstimate {
        slow: estimate.clone(),
        average: estimate.clone(),
        fast: estimate,
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain_id.clone()
    }

    fn fee_asset_id(&self) -> AssetId {
        self.fee_asset_id.clone()
    }

    async fn get_address(&self, _wallet: &dyn Wallet, _account_number: u32) -> SwapResult<String> {
        Ok(self.address.clone())
    }

    async fn get_fee_data(&self, _input: &FeeDataInput) -> SwapResult<FeeDataEstimate> {
        Ok(self.fee_data.clone())
    }

    async fn get_account(&self, address: &str) -> SwapResult<Account> {
        Ok(Self::next(&self.accounts).unwrap_or_else(|| Account {
            address: address.to_string(),
            ..Default::default()
        }))
    }

    async fn build_send_transaction(&self, input: &BuildSendTxInput, _wallet: &dyn Wallet) -> SwapResult<UnsignedTx> {
        self.built.lock().unwrap().push(input.clone());
        Ok(UnsignedTx::Opaque {
            chain_id: self.chain_id.clone(),
            body: serde_json::json!({ "to": input.to, "memo": input.memo }),
        })
    }

    async fn sign_transaction(&self, _tx: UnsignedTx, _wallet: &dyn Wallet) -> SwapResult<String> {
        Ok("0xsigned".to_string())
    }

    async fn broadcast_transaction(&self, signed_tx: &str) -> SwapResult<String> {
        self.broadcasts.lock().unwrap().push(signed_tx.to_string());
        let txid = self.txids.lock().unwrap().pop_front();
        Ok(txid.unwrap_or_else(|| "0xbroadcast".to_string()))
    }

    async fn get_tx_history(&self, _address: &str) -> SwapResult<Vec<TxHistoryEntry>> {
        Ok(self.tx_history.clone())
    }

    fn supports_sign_and_broadcast(&self) -> bool {
        self.sign_and_broadcast
    }

    async fn sign_and_broadcast_transaction(&self, _tx: UnsignedTx, _wallet: &dyn Wallet) -> SwapResult<String> {
        Ok("0xsignedandbroadcast".to_string())
    }

    fn as_evm(&self) -> Option<&dyn EvmChainAdapter> {
        if self.evm { Some(self) } else { None }
    }
}

#[async_trait]
impl EvmChainAdapter for MockAdapter {
    fn evm_chain_id(&self) -> u64 {
        self.chain_id.evm_chain_id().unwrap_or_default()
    }

    async fn call(&self, _to: Address, _data: Bytes) -> SwapResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match Self::next(&self.call_replies) {
            Some(CallReply::Allowance(allowance)) => Ok(allowance.abi_encode().into()),
            Some(CallReply::Empty) | None => Ok(Bytes::new()),
            Some(CallReply::Fail) => Err(SwapError::new(SwapErrorType::ResponseError, "execution reverted")),
        }
    }
}

pub struct MockWallet {
    offline: bool,
    broadcast: bool,
}

impl MockWallet {
    pub fn offline() -> Self {
        Self { offline: true, broadcast: false }
    }

    pub fn broadcast_only() -> Self {
        Self { offline: false, broadcast: true }
    }

    pub fn incapable() -> Self {
        Self { offline: false, broadcast: false }
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn supports_offline_signing(&self) -> bool {
        self.offline
    }

    fn supports_broadcast(&self) -> bool {
        self.broadcast
    }

    fn evm_address(&self) -> Option<Address> {
        Some(WALLET_ADDRESS)
    }

    async fn sign_evm_transaction(&self, _tx: TransactionRequest) -> SwapResult<Bytes> {
        Ok(Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]))
    }

    async fn sign_evm_hash(&self, _hash: B256) -> SwapResult<Bytes> {
        Ok(Bytes::from(vec![0x11u8; 65]))
    }
}

/// Bare quote with no fees, priced at `buy / sell` in human units.
pub fn quote(sell_asset: Asset, buy_asset: Asset, sell_amount: U256, buy_amount: U256) -> TradeQuote {
    TradeQuote {
        rate: Decimal::ZERO,
        fee_data: QuoteFeeData::network_only(U256::ZERO),
        sell_amount_before_fees_crypto_base_unit: sell_amount,
        buy_amount_crypto_base_unit: buy_amount,
        minimum_crypto_human: Decimal::ZERO,
        maximum_crypto_human: Decimal::ONE_THOUSAND,
        allowance_contract: None,
        account_number: 0,
        sources: SwapSource::whole("mock"),
        sell_asset,
        buy_asset,
    }
}

/// Venue double. Quotes fail unless a canned quote is set.
pub struct MockSwapper {
    name: SwapperName,
    supported: Vec<AssetId>,
    quote: Option<TradeQuote>,
    usd_rate: Decimal,
    quotes_requested: AtomicUsize,
}

impl MockSwapper {
    pub fn new(name: SwapperName, supported: Vec<AssetId>) -> Self {
        Self {
            name,
            supported,
            quote: None,
            usd_rate: Decimal::ONE,
            quotes_requested: AtomicUsize::new(0),
        }
    }

    pub fn with_quote(mut self, quote: TradeQuote, buy_usd_rate: Decimal) -> Self {
        self.quote = Some(quote);
        self.usd_rate = buy_usd_rate;
        self
    }

    pub fn quotes_requested(&self) -> usize {
        self.quotes_requested.load(Ordering::SeqCst)
    }

    fn unsupported(&self) -> SwapError {
        SwapError::new(SwapErrorType::ResponseError, format!("{:?} mock does not do this", self.name))
    }
}

#[async_trait]
impl Swapper for MockSwapper {
    fn name(&self) -> SwapperName {
        self.name
    }

    async fn get_trade_quote(&self, _input: &GetTradeQuoteInput) -> SwapResult<TradeQuote> {
        self.quotes_requested.fetch_add(1, Ordering::SeqCst);
        self.quote
            .clone()
            .ok_or_else(|| SwapError::new(SwapErrorType::TradeQuoteFailed, "no liquidity"))
    }

    async fn build_trade(&self, _input: &BuildTradeInput) -> SwapResult<Trade> {
        Err(self.unsupported())
    }

    async fn execute_trade(&self, _trade: Trade, _wallet: &dyn Wallet) -> SwapResult<TradeResult> {
        Err(self.unsupported())
    }

    async fn get_trade_txs(&self, _result: &TradeResult) -> SwapResult<TradeTxs> {
        Err(self.unsupported())
    }

    async fn get_usd_rate(&self, _asset: &Asset) -> SwapResult<Decimal> {
        Ok(self.usd_rate)
    }

    async fn get_min_max(&self, _sell_asset: &Asset) -> SwapResult<MinMax> {
        Err(self.unsupported())
    }

    async fn approval_needed(&self, _quote: &TradeQuote, _wallet: &dyn Wallet) -> SwapResult<ApprovalNeeded> {
        Ok(ApprovalNeeded { approval_needed: false })
    }

    async fn approve_infinite(&self, _quote: &TradeQuote, _wallet: &dyn Wallet) -> SwapResult<String> {
        Err(self.unsupported())
    }

    async fn approve_amount(&self, _quote: &TradeQuote, _wallet: &dyn Wallet, _amount: Option<U256>) -> SwapResult<String> {
        Err(self.unsupported())
    }

    fn filter_buy_assets_by_sell_asset_id(&self, sell_asset_id: &AssetId, asset_ids: &[AssetId]) -> Vec<AssetId> {
        if !self.supported.contains(sell_asset_id) {
            return Vec::new();
        }
        asset_ids
            .iter()
            .filter(|id| *id != sell_asset_id && self.supported.contains(id))
            .cloned()
            .collect()
    }

    fn filter_asset_ids_by_sellable(&self, asset_ids: &[AssetId]) -> Vec<AssetId> {
        asset_ids.iter().filter(|id| self.supported.contains(id)).cloned().collect()
    }
}
