//! Response building and the funding policy
//!
//! A response spends the contract's output of the request. The request must
//! fund every response output plus the flat response fee (and the contract
//! fee when one is configured). When it cannot, the contract rejects with
//! `InsufficientTxFeeFunding` if at least the rejection can be paid for, and
//! stays silent otherwise.

use crate::action::{Action, Rejection};
use crate::error::{ProtocolError, ProtocolResult};
use crate::tx::{OutPoint, Transaction, TxInput, TxOutput};
use smartledger_core::{Address, RejectionCode, Timestamp, TxId};
use tracing::debug;

/// Value thresholds applied to every response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPolicy {
    /// Value placed on each notification output
    pub dust_limit: u64,
    /// Miner fee of a success response
    pub response_fee: u64,
    /// Miner fee of a rejection; below `rejection_fee + dust_limit` the
    /// contract does not respond at all
    pub rejection_fee: u64,
    pub contract_fee: u64,
    pub fee_address: Option<Address>,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            dust_limit: 546,
            response_fee: 500,
            rejection_fee: 200,
            contract_fee: 0,
            fee_address: None,
        }
    }
}

impl FundingPolicy {
    /// Minimum funding for which a rejection is still sent
    pub fn rejection_minimum(&self) -> u64 {
        self.rejection_fee + self.dust_limit
    }

    /// Output paying the contract fee, when one is configured
    pub fn contract_fee_output(&self) -> Option<TxOutput> {
        match self.fee_address {
            Some(address) if self.contract_fee > 0 => Some(TxOutput::new(address, self.contract_fee)),
            _ => None,
        }
    }
}

/// Outcome of trying to answer a request
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Send(Transaction),
    /// Funding too low for any reply
    Silent { available: u64 },
}

/// Builds response transactions for one contract
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    contract: Address,
    policy: FundingPolicy,
}

impl ResponseWriter {
    pub fn new(contract: Address, policy: FundingPolicy) -> Self {
        Self { contract, policy }
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    pub fn policy(&self) -> &FundingPolicy {
        &self.policy
    }

    /// Inputs spending every output of `request` paid to this contract
    pub fn funding_inputs(&self, request: &Transaction) -> Vec<TxInput> {
        request
            .output_indices(&self.contract)
            .into_iter()
            .filter_map(|index| {
                request.output(index).map(|output| {
                    TxInput::new(OutPoint::new(request.txid, index), self.contract, output.value)
                })
            })
            .collect()
    }

    /// Inputs spending selected outputs of `request`
    pub fn inputs_for(&self, request: &Transaction, indices: &[u32]) -> Vec<TxInput> {
        indices
            .iter()
            .filter_map(|index| {
                request.output(*index).map(|output| {
                    TxInput::new(OutPoint::new(request.txid, *index), output.address, output.value)
                })
            })
            .collect()
    }

    /// Value still required beyond what `inputs` provide
    pub fn shortfall(&self, inputs: &[TxInput], outputs: &[TxOutput]) -> Option<(u64, u64)> {
        let available: u64 = inputs.iter().map(|i| i.value).sum();
        let fee_output = self.policy.contract_fee_output().map_or(0, |o| o.value);
        let required = outputs.iter().map(|o| o.value).sum::<u64>() + self.policy.response_fee + fee_output;
        (available < required).then_some((required, available))
    }

    /// Build a funded success response from explicit inputs
    pub fn build(
        &self,
        inputs: Vec<TxInput>,
        mut outputs: Vec<TxOutput>,
        action: Action,
    ) -> ProtocolResult<Transaction> {
        if let Some((required, available)) = self.shortfall(&inputs, &outputs) {
            return Err(ProtocolError::InsufficientFunding { required, available });
        }
        if let Some(fee) = self.policy.contract_fee_output() {
            outputs.push(fee);
        }
        Transaction::new(inputs, outputs, action)
    }

    /// Message funded by `inputs` that passes everything but the response
    /// fee on to `to`
    pub fn pass_on(&self, inputs: Vec<TxInput>, to: Address, action: Action) -> ProtocolResult<Transaction> {
        let available: u64 = inputs.iter().map(|i| i.value).sum();
        let required = self.policy.response_fee + self.policy.dust_limit;
        if available < required {
            return Err(ProtocolError::InsufficientFunding { required, available });
        }
        let outputs = vec![TxOutput::new(to, available - self.policy.response_fee)];
        Transaction::new(inputs, outputs, action)
    }

    /// Success response funded by the contract's outputs of `request`
    pub fn respond(
        &self,
        request: &Transaction,
        outputs: Vec<TxOutput>,
        action: Action,
    ) -> ProtocolResult<Transaction> {
        self.build(self.funding_inputs(request), outputs, action)
    }

    /// Success response, falling back to a fee rejection or silence
    pub fn respond_or_reject(
        &self,
        request: &Transaction,
        outputs: Vec<TxOutput>,
        action: Action,
        now: Timestamp,
    ) -> ProtocolResult<Response> {
        match self.respond(request, outputs, action) {
            Ok(tx) => Ok(Response::Send(tx)),
            Err(ProtocolError::InsufficientFunding { required, available }) => {
                debug!(
                    txid = %request.txid,
                    required,
                    available,
                    "response underfunded"
                );
                self.reject_funding(request, now)
            }
            Err(e) => Err(e),
        }
    }

    /// Rejection for an underfunded request, or silence when even that is unaffordable
    pub fn reject_funding(&self, request: &Transaction, now: Timestamp) -> ProtocolResult<Response> {
        let available = request.value_to(&self.contract);
        if available < self.policy.rejection_minimum() {
            return Ok(Response::Silent { available });
        }
        self.reject(
            request,
            RejectionCode::InsufficientTxFeeFunding,
            "insufficient funding for response",
            now,
        )
        .map(Response::Send)
    }

    /// Rejection of `request`, refunding the sender what the funding allows
    pub fn reject(
        &self,
        request: &Transaction,
        code: RejectionCode,
        message: impl Into<String>,
        now: Timestamp,
    ) -> ProtocolResult<Transaction> {
        self.reject_with(self.funding_inputs(request), request.sender().copied(), code, message, None, now, &[])
    }

    /// Rejection from explicit inputs
    ///
    /// `ref_txid` names the rejected request when input 0 spends a different
    /// transaction. `notify` addresses receive a dust output so they observe
    /// the rejection; any remainder is refunded to `refund_to`.
    #[allow(clippy::too_many_arguments)]
    pub fn reject_with(
        &self,
        inputs: Vec<TxInput>,
        refund_to: Option<Address>,
        code: RejectionCode,
        message: impl Into<String>,
        ref_txid: Option<TxId>,
        now: Timestamp,
        notify: &[Address],
    ) -> ProtocolResult<Transaction> {
        let available: u64 = inputs.iter().map(|i| i.value).sum();
        let mut remaining = available.saturating_sub(self.policy.rejection_fee);
        let mut outputs = Vec::new();

        for address in notify {
            if remaining < self.policy.dust_limit {
                break;
            }
            outputs.push(TxOutput::new(*address, self.policy.dust_limit));
            remaining -= self.policy.dust_limit;
        }
        if let Some(address) = refund_to {
            if remaining >= self.policy.dust_limit {
                outputs.push(TxOutput::new(address, remaining));
            }
        }

        let action = Action::Rejection(Rejection {
            code,
            message: message.into(),
            ref_txid,
            timestamp: now,
        });
        Transaction::new(inputs, outputs, action)
    }
}
