//! Transfer orchestration for one contract
//!
//! ```text
//! single contract:  Transfer ──► Settlement (signed and broadcast here)
//!
//! multi-contract:   Transfer ──► C1 reserves ──► SettlementRequest ──► C2 reserves ──► ...
//!                   ... Cn reserves, signs ──► SignatureRequest ──► Cn-1 verifies, signs ──► ...
//!                   ... C1 verifies, signs, broadcasts the Settlement
//! ```
//!
//! Every contract finalizes its holdings when it observes the Settlement.
//! The originating contract (C1) keeps a pending transfer with a scheduled
//! timeout; a peer rejection or the timeout reverts its reservations and
//! broadcasts a transfer rejection that lets every participant release its
//! locks. Whichever of the final signature request and the timeout arrives
//! first wins; the other finds no pending transfer and does nothing.

use crate::builder::{build_settlement, check_base, check_funding, is_complete, merge_assets, settlement_of};
use crate::error::{SettlementError, SettlementResult};
use crate::layout::TransferLayout;
use crate::ledger::TransferLedger;
use crate::pending::{PendingRepository, PendingTransfer};
use crate::refund::rejection_outputs;
use crate::state::TransferState;
use crate::tracer::Tracer;
use smartledger_core::{Address, ContractKey, RejectionCode, Timestamp, TxId};
use smartledger_holdings::HoldingsCache;
use smartledger_protocol::{
    Action, Broadcaster, Job, JobKind, Message, MessagePayload, OutPoint, Rejection, ResponseWriter, Scheduler,
    Transaction, TransactionRepository, Transfer, TxInput,
};
use smartledger_state::{Contract, StateRepository};
use smartledger_storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    /// How long the originating contract waits for the other contracts
    pub request_timeout: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// What handling a transaction did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A settlement or message was broadcast
    Sent { txid: TxId, state: TransferState },
    /// A rejection was broadcast
    Rejected { txid: TxId, code: RejectionCode },
    /// Rejected, but the funding could not pay for a reply
    Silent { code: RejectionCode },
    /// An observed settlement was applied to this many holdings
    Finalized { holdings: usize },
    /// Reservations released on this many holdings
    Released { holdings: usize },
    /// Not for this contract, or already handled
    Ignored,
}

fn transfer_of(tx: &Transaction) -> SettlementResult<&Transfer> {
    match &tx.action {
        Action::Transfer(transfer) => Ok(transfer),
        other => Err(SettlementError::Malformed(format!("expected transfer, found {}", other.name()))),
    }
}

fn check_contract(contract: &Contract, now: Timestamp) -> SettlementResult<()> {
    if let Some(moved_to) = contract.moved_to {
        return Err(SettlementError::ContractMoved(moved_to));
    }
    if contract.is_frozen(now) {
        return Err(SettlementError::ContractFrozen);
    }
    if contract.is_expired(now) {
        return Err(SettlementError::ContractExpired);
    }
    Ok(())
}

pub struct Orchestrator {
    key: ContractKey,
    writer: ResponseWriter,
    ledger: TransferLedger,
    state: StateRepository,
    pending: PendingRepository,
    tracer: Tracer,
    transactions: TransactionRepository,
    broadcaster: Arc<dyn Broadcaster>,
    scheduler: Arc<dyn Scheduler>,
    config: SettlementConfig,
}

impl Orchestrator {
    pub fn new(
        key: ContractKey,
        writer: ResponseWriter,
        store: Arc<dyn Store>,
        holdings: Arc<HoldingsCache>,
        broadcaster: Arc<dyn Broadcaster>,
        scheduler: Arc<dyn Scheduler>,
        config: SettlementConfig,
    ) -> Self {
        let state = StateRepository::new(store.clone());
        Self {
            key,
            writer,
            ledger: TransferLedger::new(holdings, state.clone()),
            state,
            pending: PendingRepository::new(store.clone()),
            tracer: Tracer::new(store.clone()),
            transactions: TransactionRepository::new(store),
            broadcaster,
            scheduler,
            config,
        }
    }

    fn address(&self) -> &Address {
        self.writer.contract()
    }

    pub fn pending(&self) -> &PendingRepository {
        &self.pending
    }

    /// Route a transfer-related transaction
    pub async fn handle(&self, tx: &Transaction, now: Timestamp) -> SettlementResult<Outcome> {
        match &tx.action {
            Action::Transfer(_) => self.transfer_request(tx, now).await,
            Action::Settlement(_) => self.settlement_observed(tx, now).await,
            Action::Message(message) => self.handle_message(tx, message, now).await,
            Action::Rejection(rejection) => self.rejection_observed(tx, rejection, now).await,
            _ => Ok(Outcome::Ignored),
        }
    }

    async fn load_contract(&self) -> SettlementResult<Contract> {
        self.state
            .fetch_contract(self.address())
            .await?
            .ok_or(SettlementError::ContractNotFound(*self.address()))
    }

    async fn load_transfer(&self, transfer_txid: &TxId) -> SettlementResult<Option<(Transaction, Transfer)>> {
        let Some(tx) = self.transactions.fetch(self.address(), transfer_txid).await? else {
            return Ok(None);
        };
        match &tx.action {
            Action::Transfer(transfer) => {
                let transfer = transfer.clone();
                Ok(Some((tx, transfer)))
            }
            _ => Ok(None),
        }
    }

    async fn send(&self, mut tx: Transaction) -> SettlementResult<Transaction> {
        tx.sign_inputs(&self.key);
        self.broadcaster.broadcast(&tx).await?;
        Ok(tx)
    }

    // === Transfer request ===

    /// Handle a transfer request; only the first contract acts on it
    pub async fn transfer_request(&self, tx: &Transaction, now: Timestamp) -> SettlementResult<Outcome> {
        let transfer = transfer_of(tx)?;
        self.transactions.save(self.address(), tx).await?;

        let layout = match TransferLayout::new(tx, transfer) {
            Ok(layout) => layout,
            Err(e) => return self.reject_transfer(tx, transfer, None, e, None, Vec::new(), now).await,
        };
        if !layout.is_first(self.address()) {
            debug!(transfer = %tx.txid, "waiting for settlement request");
            return Ok(Outcome::Ignored);
        }

        match self.start_transfer(tx, transfer, &layout, now).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_rejection() => {
                self.reject_transfer(tx, transfer, Some(&layout), e, None, Vec::new(), now)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn start_transfer(
        &self,
        tx: &Transaction,
        transfer: &Transfer,
        layout: &TransferLayout,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        let mut pending = PendingTransfer::new(tx.txid, true, layout.contracts().copied().collect(), now);

        if !transfer.offer_expiry.is_zero() && now > transfer.offer_expiry {
            return Err(SettlementError::TransferExpired);
        }
        let contract = self.load_contract().await?;
        check_contract(&contract, now)?;

        let policy = self.writer.policy();
        let mut settle = build_settlement(tx, transfer, layout, policy, now)?;
        let single_contract = layout.is_single_contract();
        let reservation = self
            .ledger
            .reserve(&contract, tx, transfer, &settle, single_contract, now)
            .await?;
        pending.advance(TransferState::Reserved, now)?;

        if single_contract {
            merge_assets(&mut settle, reservation.assets.clone())?;
            let Transaction {
                inputs,
                outputs,
                action,
                ..
            } = settle;
            let response = self.send(self.writer.build(inputs, outputs, action)?).await?;
            self.ledger.commit(&address, &reservation).await?;
            pending.advance(TransferState::Settled, now)?;
            info!(transfer = %tx.txid, settlement = %response.txid, "single contract settlement");
            return Ok(Outcome::Sent {
                txid: response.txid,
                state: pending.state,
            });
        }

        if let Some(fee) = policy.contract_fee_output() {
            settle.outputs.push(fee);
        }
        merge_assets(&mut settle, reservation.assets.clone())?;

        let boomerang = layout
            .boomerang_index(tx)
            .ok_or_else(|| SettlementError::Malformed("multi-contract transfer missing boomerang output".into()))?;
        let next = layout
            .next_after(&address)
            .ok_or_else(|| SettlementError::Malformed("next contract not found".into()))?;

        let message = Action::Message(Message {
            payload: MessagePayload::SettlementRequest {
                transfer_txid: tx.txid,
                settlement: Box::new(settle),
            },
            timestamp: now,
        });
        let request = self
            .writer
            .pass_on(self.writer.inputs_for(tx, &[boomerang]), next, message)?;
        let request = self.send(request).await?;
        self.ledger.commit(&address, &reservation).await?;

        let boomerang = OutPoint::new(tx.txid, boomerang);
        self.tracer.add(&address, &boomerang, &tx.txid).await?;
        self.tracer.add_outputs(&address, &request, &tx.txid).await?;

        let timeout = now.add(self.config.request_timeout);
        let job = Job::new(
            address,
            timeout,
            JobKind::TransferTimeout {
                transfer_txid: tx.txid,
            },
        );
        pending.timeout = timeout;
        pending.job_id = Some(job.id.clone());
        pending.boomerang = Some(boomerang);
        self.scheduler.schedule(job).await?;

        pending.advance(TransferState::AwaitingSettlementRequest, now)?;
        self.pending.save(&address, &pending).await?;
        info!(transfer = %tx.txid, next = %next, "settlement request sent");
        Ok(Outcome::Sent {
            txid: request.txid,
            state: pending.state,
        })
    }

    /// Reject a transfer from the first contract's funding
    ///
    /// Spends the transfer's outputs to this contract (less the boomerang
    /// once a message spent it) plus `extra_inputs`, notifies the other
    /// contracts and the token senders, and refunds bitcoin senders.
    #[allow(clippy::too_many_arguments)]
    async fn reject_transfer(
        &self,
        tx: &Transaction,
        transfer: &Transfer,
        layout: Option<&TransferLayout>,
        error: SettlementError,
        boomerang: Option<OutPoint>,
        extra_inputs: Vec<TxInput>,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        let code = error.rejection_code();
        warn!(transfer = %tx.txid, code = %code, "transfer rejected: {}", error);

        let mut inputs: Vec<TxInput> = self
            .writer
            .funding_inputs(tx)
            .into_iter()
            .filter(|input| Some(input.outpoint) != boomerang)
            .collect();
        inputs.extend(extra_inputs);

        let policy = self.writer.policy();
        let available: u64 = inputs.iter().map(|i| i.value).sum();
        if available < policy.rejection_minimum() {
            warn!(transfer = %tx.txid, available, "rejection unfunded, no response");
            return Ok(Outcome::Silent { code });
        }

        let mut notify: Vec<Address> = layout
            .map(|l| l.contracts().filter(|c| **c != address).copied().collect())
            .unwrap_or_default();
        let mut refunds: Vec<(Address, u64)> = Vec::new();
        for asset in &transfer.assets {
            for sender in &asset.senders {
                let Some(input) = tx.inputs.get(sender.index as usize) else {
                    continue;
                };
                if asset.asset_code.is_bitcoin() {
                    refunds.push((input.address, sender.quantity));
                } else if !notify.contains(&input.address) {
                    notify.push(input.address);
                }
            }
        }

        let admin = match self.state.fetch_contract(&address).await? {
            Some(contract) => contract.admin_address(),
            None => tx.sender().copied().unwrap_or(address),
        };
        let outputs = rejection_outputs(policy, available, &notify, &refunds, tx.sender().copied(), admin);
        let action = Action::Rejection(Rejection {
            code,
            message: error.to_string(),
            ref_txid: Some(tx.txid),
            timestamp: now,
        });
        let rejection = self.send(Transaction::new(inputs, outputs, action)?).await?;
        Ok(Outcome::Rejected {
            txid: rejection.txid,
            code,
        })
    }

    /// Revert the originating contract's side and reject the transfer
    async fn abort_transfer(
        &self,
        tx: &Transaction,
        transfer: &Transfer,
        layout: &TransferLayout,
        mut pending: PendingTransfer,
        error: SettlementError,
        extra_inputs: Vec<TxInput>,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        let reverted = self.ledger.revert(&address, tx, transfer, now).await?;
        self.pending.remove(&address, &tx.txid).await?;
        self.tracer.remove(&address, &tx.txid).await?;
        if let Some(job_id) = &pending.job_id {
            self.scheduler.cancel(job_id).await?;
        }

        if matches!(error, SettlementError::Timeout) {
            pending.advance(TransferState::TimedOut, now)?;
        }
        pending.advance(TransferState::Rejected, now)?;
        info!(transfer = %tx.txid, reverted, "transfer aborted");

        self.reject_transfer(tx, transfer, Some(layout), error, pending.boomerang, extra_inputs, now)
            .await
    }

    // === Messages between contracts ===

    async fn handle_message(&self, tx: &Transaction, message: &Message, now: Timestamp) -> SettlementResult<Outcome> {
        if tx.sender() == Some(self.address()) || tx.value_to(self.address()) == 0 {
            return Ok(Outcome::Ignored);
        }
        match &message.payload {
            MessagePayload::SettlementRequest {
                transfer_txid,
                settlement,
            } => {
                self.settlement_request(tx, transfer_txid, settlement.as_ref().clone(), now)
                    .await
            }
            MessagePayload::SignatureRequest {
                transfer_txid,
                settlement,
            } => {
                self.signature_request(tx, transfer_txid, settlement.as_ref().clone(), now)
                    .await
            }
        }
    }

    /// Add this contract's settlement data, then pass the settlement on
    pub async fn settlement_request(
        &self,
        message_tx: &Transaction,
        transfer_txid: &TxId,
        settle: Transaction,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        let Some((tx, transfer)) = self.load_transfer(transfer_txid).await? else {
            warn!(transfer = %transfer_txid, "settlement request for unknown transfer");
            return Ok(Outcome::Ignored);
        };
        let Ok(layout) = TransferLayout::new(&tx, &transfer) else {
            return Ok(Outcome::Ignored);
        };
        if !layout.involves(&address) || layout.is_first(&address) {
            return Ok(Outcome::Ignored);
        }
        if self.pending.fetch(&address, transfer_txid).await?.is_some() {
            debug!(transfer = %transfer_txid, "settlement request already handled");
            return Ok(Outcome::Ignored);
        }

        match self.add_settlement_data(message_tx, &tx, &transfer, &layout, settle, now).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_rejection() => self.reject_message(message_tx, &tx, &layout, e, now).await,
            Err(e) => Err(e),
        }
    }

    async fn add_settlement_data(
        &self,
        message_tx: &Transaction,
        tx: &Transaction,
        transfer: &Transfer,
        layout: &TransferLayout,
        mut settle: Transaction,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        let contract = self.load_contract().await?;
        check_contract(&contract, now)?;

        let policy = self.writer.policy();
        check_base(&settle, tx, transfer, layout, policy)?;
        let reservation = self.ledger.reserve(&contract, tx, transfer, &settle, false, now).await?;
        let mut pending = PendingTransfer::new(tx.txid, false, layout.contracts().copied().collect(), now);
        pending.advance(TransferState::Reserved, now)?;

        if let Some(fee) = policy.contract_fee_output() {
            settle.outputs.push(fee);
        }
        merge_assets(&mut settle, reservation.assets.clone())?;

        let (to, payload) = if is_complete(transfer, settlement_of(&settle)?) {
            check_funding(&settle, policy)?;
            settle.sign_inputs(&self.key);
            let previous = layout
                .previous_before(&address)
                .ok_or_else(|| SettlementError::Malformed("previous contract not found".into()))?;
            let payload = MessagePayload::SignatureRequest {
                transfer_txid: tx.txid,
                settlement: Box::new(settle),
            };
            (previous, payload)
        } else {
            let next = layout
                .next_after(&address)
                .ok_or_else(|| SettlementError::Malformed("settlement incomplete with no next contract".into()))?;
            let payload = MessagePayload::SettlementRequest {
                transfer_txid: tx.txid,
                settlement: Box::new(settle),
            };
            (next, payload)
        };

        let reply = self.writer.pass_on(
            self.writer.funding_inputs(message_tx),
            to,
            Action::Message(Message {
                payload,
                timestamp: now,
            }),
        )?;
        let reply = self.send(reply).await?;
        self.ledger.commit(&address, &reservation).await?;

        pending.advance(TransferState::AwaitingSignatureRequest, now)?;
        self.pending.save(&address, &pending).await?;
        info!(transfer = %tx.txid, to = %to, "settlement data added");
        Ok(Outcome::Sent {
            txid: reply.txid,
            state: pending.state,
        })
    }

    /// Co-sign a complete settlement; the first contract broadcasts it
    pub async fn signature_request(
        &self,
        message_tx: &Transaction,
        transfer_txid: &TxId,
        settle: Transaction,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        let Some((tx, transfer)) = self.load_transfer(transfer_txid).await? else {
            warn!(transfer = %transfer_txid, "signature request for unknown transfer");
            return Ok(Outcome::Ignored);
        };
        let Ok(layout) = TransferLayout::new(&tx, &transfer) else {
            return Ok(Outcome::Ignored);
        };
        let Some(pending) = self.pending.fetch(&address, transfer_txid).await? else {
            info!(transfer = %transfer_txid, "no pending transfer, signature request ignored");
            return Ok(Outcome::Ignored);
        };

        let result = if layout.is_first(&address) {
            self.complete_settlement(&tx, &transfer, &layout, &pending, settle, now)
                .await
        } else {
            self.cosign(message_tx, &tx, &transfer, &layout, &pending, settle, now)
                .await
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_rejection() && layout.is_first(&address) => {
                let extra = self.writer.funding_inputs(message_tx);
                self.abort_transfer(&tx, &transfer, &layout, pending, e, extra, now)
                    .await
            }
            Err(e) if e.is_rejection() => self.reject_message(message_tx, &tx, &layout, e, now).await,
            Err(e) => Err(e),
        }
    }

    async fn verify_settlement(
        &self,
        tx: &Transaction,
        transfer: &Transfer,
        layout: &TransferLayout,
        settle: &Transaction,
        now: Timestamp,
    ) -> SettlementResult<()> {
        let contract = self.load_contract().await?;
        check_contract(&contract, now)?;
        check_base(settle, tx, transfer, layout, self.writer.policy())?;
        if !is_complete(transfer, settlement_of(settle)?) {
            return Err(SettlementError::Malformed("settlement incomplete".into()));
        }
        self.ledger.verify(self.address(), tx, transfer, settle, now).await
    }

    async fn complete_settlement(
        &self,
        tx: &Transaction,
        transfer: &Transfer,
        layout: &TransferLayout,
        pending: &PendingTransfer,
        mut settle: Transaction,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        self.verify_settlement(tx, transfer, layout, &settle, now).await?;
        check_funding(&settle, self.writer.policy())?;

        settle.sign_inputs(&self.key);
        if !settle.is_fully_signed() {
            return Err(SettlementError::Malformed("settlement missing contract signatures".into()));
        }
        self.broadcaster.broadcast(&settle).await?;

        let mut pending = pending.clone();
        pending.advance(TransferState::Settled, now)?;
        self.pending.remove(&address, &tx.txid).await?;
        self.tracer.remove(&address, &tx.txid).await?;
        if let Some(job_id) = &pending.job_id {
            self.scheduler.cancel(job_id).await?;
        }
        info!(transfer = %tx.txid, settlement = %settle.txid, "multi-contract settlement broadcast");
        Ok(Outcome::Sent {
            txid: settle.txid,
            state: pending.state,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn cosign(
        &self,
        message_tx: &Transaction,
        tx: &Transaction,
        transfer: &Transfer,
        layout: &TransferLayout,
        pending: &PendingTransfer,
        mut settle: Transaction,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        self.verify_settlement(tx, transfer, layout, &settle, now).await?;
        settle.sign_inputs(&self.key);

        let previous = layout
            .previous_before(self.address())
            .ok_or_else(|| SettlementError::Malformed("previous contract not found".into()))?;
        let reply = self.writer.pass_on(
            self.writer.funding_inputs(message_tx),
            previous,
            Action::Message(Message {
                payload: MessagePayload::SignatureRequest {
                    transfer_txid: tx.txid,
                    settlement: Box::new(settle),
                },
                timestamp: now,
            }),
        )?;
        let reply = self.send(reply).await?;
        info!(transfer = %tx.txid, to = %previous, "settlement co-signed");
        Ok(Outcome::Sent {
            txid: reply.txid,
            state: pending.state,
        })
    }

    /// Rejection from a later contract, sent to the first contract
    async fn reject_message(
        &self,
        message_tx: &Transaction,
        tx: &Transaction,
        layout: &TransferLayout,
        error: SettlementError,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let code = error.rejection_code();
        warn!(transfer = %tx.txid, code = %code, "settlement message rejected: {}", error);

        let inputs = self.writer.funding_inputs(message_tx);
        let available: u64 = inputs.iter().map(|i| i.value).sum();
        if available < self.writer.policy().rejection_minimum() {
            warn!(transfer = %tx.txid, available, "rejection unfunded, no response");
            return Ok(Outcome::Silent { code });
        }

        let rejection = self.writer.reject_with(
            inputs,
            Some(*layout.first()),
            code,
            error.to_string(),
            Some(tx.txid),
            now,
            &[],
        )?;
        let rejection = self.send(rejection).await?;
        Ok(Outcome::Rejected {
            txid: rejection.txid,
            code,
        })
    }

    // === Observed responses ===

    /// Apply a broadcast settlement to this contract's holdings
    pub async fn settlement_observed(&self, tx: &Transaction, now: Timestamp) -> SettlementResult<Outcome> {
        let address = *self.address();
        let holdings = self.ledger.finalize(&address, tx, now).await?;
        if let Some(transfer_txid) = tx.ref_txid() {
            if self.pending.remove(&address, &transfer_txid).await? {
                self.tracer.remove(&address, &transfer_txid).await?;
                debug!(transfer = %transfer_txid, "pending transfer settled");
            }
        }
        Ok(Outcome::Finalized { holdings })
    }

    /// Handle a rejection of a transfer this contract takes part in
    ///
    /// The first contract aborts the whole transfer on a peer's rejection;
    /// every other contract releases its own reservations when the first
    /// contract's rejection arrives. Reprocessing changes nothing.
    pub async fn rejection_observed(
        &self,
        tx: &Transaction,
        rejection: &Rejection,
        now: Timestamp,
    ) -> SettlementResult<Outcome> {
        let address = *self.address();
        if tx.sender() == Some(&address) {
            return Ok(Outcome::Ignored);
        }

        let transfer_txid = match rejection.ref_txid {
            Some(txid) => Some(txid),
            None => match self.tracer.retrace(&address, tx).await? {
                Some(txid) => Some(txid),
                None => tx.ref_txid(),
            },
        };
        let Some(transfer_txid) = transfer_txid else {
            return Ok(Outcome::Ignored);
        };
        let Some((transfer_tx, transfer)) = self.load_transfer(&transfer_txid).await? else {
            return Ok(Outcome::Ignored);
        };
        let Ok(layout) = TransferLayout::new(&transfer_tx, &transfer) else {
            return Ok(Outcome::Ignored);
        };
        if !layout.involves(&address) {
            return Ok(Outcome::Ignored);
        }

        // Only a participating contract can abort a transfer, proven by its
        // signature on the input it spends
        let Some(sender) = tx.sender().copied() else {
            return Ok(Outcome::Ignored);
        };
        if !layout.involves(&sender) || !tx.verify_input(0)? {
            warn!(transfer = %transfer_txid, sender = %sender, "rejection from outside the transfer ignored");
            return Ok(Outcome::Ignored);
        }

        match self.pending.fetch(&address, &transfer_txid).await? {
            Some(pending) if pending.originator => {
                let error = SettlementError::PeerRejected {
                    code: rejection.code,
                    message: rejection.message.clone(),
                };
                let extra = self.writer.funding_inputs(tx);
                self.abort_transfer(&transfer_tx, &transfer, &layout, pending, error, extra, now)
                    .await
            }
            // Other participants release only when the originator aborts
            _ if !layout.is_first(&sender) => {
                debug!(transfer = %transfer_txid, sender = %sender, "waiting for the originating contract");
                Ok(Outcome::Ignored)
            }
            pending => {
                let holdings = self.ledger.revert(&address, &transfer_tx, &transfer, now).await?;
                if pending.is_some() {
                    self.pending.remove(&address, &transfer_txid).await?;
                }
                info!(transfer = %transfer_txid, holdings, "transfer reservations released");
                Ok(Outcome::Released { holdings })
            }
        }
    }

    /// Scheduled timeout of a multi-contract transfer
    pub async fn transfer_timeout(&self, transfer_txid: &TxId, now: Timestamp) -> SettlementResult<Outcome> {
        let address = *self.address();
        let Some(pending) = self.pending.fetch(&address, transfer_txid).await? else {
            debug!(transfer = %transfer_txid, "timeout after completion");
            return Ok(Outcome::Ignored);
        };
        let (tx, transfer) = self
            .load_transfer(transfer_txid)
            .await?
            .ok_or(SettlementError::TransferNotFound(*transfer_txid))?;
        let layout = TransferLayout::new(&tx, &transfer)?;
        self.abort_transfer(&tx, &transfer, &layout, pending, SettlementError::Timeout, Vec::new(), now)
            .await
    }
}
