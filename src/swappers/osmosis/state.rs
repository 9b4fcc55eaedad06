//! Multi-leg Osmosis trade flow
//!
//! Cosmos Hub ATOM is moved onto Osmosis over IBC, swapped in the GAMM pool,
//! and moved back when the user buys ATOM. Each leg is confirmed on chain
//! before the next one starts.

use alloy::primitives::U256;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::{
    chain::{sign_and_send, BuildSendTxInput, ChainAdapter, TxKind, Wallet},
    config::PollConfig,
    errors::{SwapError, SwapErrorType, SwapResult},
    network::VenueClient,
    types::TradeResult,
};
use super::helpers::{
    poll_for_atom_channel_balance, poll_for_complete, TxStatus, ATOM_DENOM, ATOM_OSMO_POOL_ID, COSMO_OSMO_CHANNEL,
    IBC_TRANSFER_PORT, OSMO_COSMO_CHANNEL, UATOM_DENOM,
};

#[derive(Debug)]
pub enum OsmosisTradeState {
    Init,
    IbcTransferPending { txid: String },
    /// `amount` is the ATOM balance that arrived on Osmosis.
    IbcTransferConfirmed { amount: U256 },
    SwapPending { txid: String },
    SwapConfirmed { txid: String },
    ReturnTransferPending { swap_txid: String, txid: String },
    ReturnTransferConfirmed { swap_txid: String },
    Done(TradeResult),
    Error {
        last_confirmed: &'static str,
        failed_in: &'static str,
        cause: SwapError,
    },
}

impl OsmosisTradeState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::IbcTransferPending { .. } => "IbcTransferPending",
            Self::IbcTransferConfirmed { .. } => "IbcTransferConfirmed",
            Self::SwapPending { .. } => "SwapPending",
            Self::SwapConfirmed { .. } => "SwapConfirmed",
            Self::ReturnTransferPending { .. } => "ReturnTransferPending",
            Self::ReturnTransferConfirmed { .. } => "ReturnTransferConfirmed",
            Self::Done(_) => "Done",
            Self::Error { .. } => "Error",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            Self::Init | Self::IbcTransferConfirmed { .. } | Self::SwapConfirmed { .. } | Self::ReturnTransferConfirmed { .. }
        )
    }
}

/// Chain side plumbing the flow runs against.
pub struct FlowContext<'a> {
    pub osmosis: &'a dyn ChainAdapter,
    pub cosmos: &'a dyn ChainAdapter,
    pub wallet: &'a dyn Wallet,
    pub client: &'a VenueClient,
    pub osmo_url: &'a str,
    pub cosmos_url: &'a str,
    pub poll: &'a PollConfig,
    pub settle_delay: Duration,
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeLeg {
    /// Selling OSMO on Osmosis rather than ATOM from the Cosmos Hub.
    pub from_osmo: bool,
    pub sell_denom: &'static str,
    pub buy_denom: &'static str,
    pub sell_amount: U256,
    pub account_number: u32,
    pub receive_account_number: u32,
    pub receive_address: String,
}

pub struct OsmosisTradeFlow<'a> {
    ctx: FlowContext<'a>,
    leg: TradeLeg,
    sell_address: String,
    cosmos_ibc_txid: Option<String>,
    previous_cosmos_txid: Option<String>,
}

impl<'a> OsmosisTradeFlow<'a> {
    pub fn new(ctx: FlowContext<'a>, leg: TradeLeg) -> Self {
        Self {
            ctx,
            leg,
            sell_address: String::new(),
            cosmos_ibc_txid: None,
            previous_cosmos_txid: None,
        }
    }

    /// Drives the flow to `Done`. A failure stops at the failing leg; nothing
    /// already broadcast is rolled back.
    pub async fn run(mut self) -> SwapResult<TradeResult> {
        let mut state = OsmosisTradeState::Init;
        let mut last_confirmed = state.name();

        loop {
            state = match state {
                OsmosisTradeState::Done(result) => {
                    info!("🧪 Osmosis trade complete: {}", result.trade_id);
                    return Ok(result);
                }
                OsmosisTradeState::Error { last_confirmed, failed_in, cause } => {
                    warn!("⚠️ Osmosis trade failed in {} after {}: {}", failed_in, last_confirmed, cause);
                    return Err(SwapError::new(
                        SwapErrorType::ExecuteTradeFailed,
                        format!("[osmosisExecuteTrade] failed in {}", failed_in),
                    )
                    .with_details(serde_json::json!({
                        "lastConfirmedState": last_confirmed,
                        "failedState": failed_in,
                    }))
                    .with_cause(cause));
                }
                current => {
                    let failed_in = current.name();
                    match self.step(current).await {
                        Ok(next) => {
                            debug!("Osmosis trade {} -> {}", failed_in, next.name());
                            if next.is_confirmed() {
                                last_confirmed = next.name();
                            }
                            next
                        }
                        Err(cause) => OsmosisTradeState::Error { last_confirmed, failed_in, cause },
                    }
                }
            };
        }
    }

    async fn step(&mut self, state: OsmosisTradeState) -> SwapResult<OsmosisTradeState> {
        match state {
            OsmosisTradeState::Init => self.start().await,
            OsmosisTradeState::IbcTransferPending { txid } => {
                self.confirm(self.ctx.cosmos_url, &txid, "IBC transfer").await?;
                let amount = poll_for_atom_channel_balance(
                    self.ctx.client,
                    self.ctx.osmo_url,
                    &self.leg.receive_address,
                    self.ctx.poll,
                )
                .await?;
                self.settle().await;
                Ok(OsmosisTradeState::IbcTransferConfirmed { amount })
            }
            OsmosisTradeState::IbcTransferConfirmed { amount } => {
                let osmo_address = self.leg.receive_address.clone();
                let txid = self.swap(&osmo_address, self.leg.receive_account_number, amount).await?;
                Ok(OsmosisTradeState::SwapPending { txid })
            }
            OsmosisTradeState::SwapPending { txid } => {
                self.confirm(self.ctx.osmo_url, &txid, "swap").await?;
                Ok(OsmosisTradeState::SwapConfirmed { txid })
            }
            OsmosisTradeState::SwapConfirmed { txid } => {
                if !self.leg.from_osmo {
                    return Ok(OsmosisTradeState::Done(TradeResult {
                        trade_id: txid,
                        previous_cosmos_txid: self.cosmos_ibc_txid.take(),
                        cosmos_address: None,
                    }));
                }
                let return_txid = self.return_transfer().await?;
                Ok(OsmosisTradeState::ReturnTransferPending { swap_txid: txid, txid: return_txid })
            }
            OsmosisTradeState::ReturnTransferPending { swap_txid, txid } => {
                self.confirm(self.ctx.osmo_url, &txid, "return transfer").await?;
                Ok(OsmosisTradeState::ReturnTransferConfirmed { swap_txid })
            }
            OsmosisTradeState::ReturnTransferConfirmed { swap_txid } => Ok(OsmosisTradeState::Done(TradeResult {
                trade_id: swap_txid,
                previous_cosmos_txid: self.previous_cosmos_txid.take(),
                cosmos_address: Some(self.leg.receive_address.clone()),
            })),
            terminal @ (OsmosisTradeState::Done(_) | OsmosisTradeState::Error { .. }) => Err(SwapError::new(
                SwapErrorType::ValidationFailed,
                format!("{} has no transition", terminal.name()),
            )),
        }
    }

    async fn start(&mut self) -> SwapResult<OsmosisTradeState> {
        if self.leg.from_osmo {
            self.sell_address = self.ctx.osmosis.get_address(self.ctx.wallet, self.leg.account_number).await?;
            let sell_address = self.sell_address.clone();
            let txid = self.swap(&sell_address, self.leg.account_number, self.leg.sell_amount).await?;
            return Ok(OsmosisTradeState::SwapPending { txid });
        }

        self.sell_address = self.ctx.cosmos.get_address(self.ctx.wallet, self.leg.account_number).await?;
        let input = BuildSendTxInput {
            to: self.leg.receive_address.clone(),
            value: self.leg.sell_amount,
            account_number: self.leg.account_number,
            memo: None,
            kind: TxKind::IbcTransfer {
                source_port: IBC_TRANSFER_PORT.to_string(),
                source_channel: COSMO_OSMO_CHANNEL.to_string(),
                denom: UATOM_DENOM.to_string(),
            },
        };
        let tx = self.ctx.cosmos.build_send_transaction(&input, self.ctx.wallet).await?;
        let txid = sign_and_send(self.ctx.cosmos, self.ctx.wallet, tx).await?;
        info!("🌉 IBC transfer {} -> Osmosis sent: {}", self.sell_address, txid);
        self.cosmos_ibc_txid = Some(txid.clone());
        Ok(OsmosisTradeState::IbcTransferPending { txid })
    }

    async fn swap(&self, from: &str, account_number: u32, amount: U256) -> SwapResult<String> {
        let input = BuildSendTxInput {
            to: from.to_string(),
            value: amount,
            account_number,
            memo: None,
            kind: TxKind::OsmosisSwap {
                pool_id: ATOM_OSMO_POOL_ID,
                token_in_denom: self.leg.sell_denom.to_string(),
                token_out_denom: self.leg.buy_denom.to_string(),
                token_out_min_amount: U256::from(1u64),
            },
        };
        let tx = self.ctx.osmosis.build_send_transaction(&input, self.ctx.wallet).await?;
        let txid = sign_and_send(self.ctx.osmosis, self.ctx.wallet, tx).await?;
        info!("🧪 Osmosis swap of {} sent: {}", amount, txid);
        Ok(txid)
    }

    async fn return_transfer(&mut self) -> SwapResult<String> {
        let amount =
            poll_for_atom_channel_balance(self.ctx.client, self.ctx.osmo_url, &self.sell_address, self.ctx.poll).await?;
        self.settle().await;

        let history = self.ctx.cosmos.get_tx_history(&self.leg.receive_address).await?;
        self.previous_cosmos_txid = history.first().map(|entry| entry.txid.clone());

        let input = BuildSendTxInput {
            to: self.leg.receive_address.clone(),
            value: amount,
            account_number: self.leg.account_number,
            memo: None,
            kind: TxKind::IbcTransfer {
                source_port: IBC_TRANSFER_PORT.to_string(),
                source_channel: OSMO_COSMO_CHANNEL.to_string(),
                denom: ATOM_DENOM.to_string(),
            },
        };
        let tx = self.ctx.osmosis.build_send_transaction(&input, self.ctx.wallet).await?;
        let txid = sign_and_send(self.ctx.osmosis, self.ctx.wallet, tx).await?;
        info!("🌉 IBC transfer back to {} sent: {}", self.leg.receive_address, txid);
        Ok(txid)
    }

    async fn confirm(&self, url: &str, txid: &str, leg: &str) -> SwapResult<()> {
        match poll_for_complete(self.ctx.client, url, txid, self.ctx.poll).await? {
            TxStatus::Success => Ok(()),
            TxStatus::Failed => Err(SwapError::new(
                SwapErrorType::ExecuteTradeFailed,
                format!("{} {} failed on chain", leg, txid),
            )),
        }
    }

    async fn settle(&self) {
        if !self.ctx.settle_delay.is_zero() {
            tokio::time::sleep(self.ctx.settle_delay).await;
        }
    }
}
