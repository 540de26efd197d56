//! Action payloads
//!
//! Requests (offers, amendments, transfers, proposals, ballots, orders) come
//! from users; responses (formations, settlements, votes, results,
//! enforcement actions, rejections) come from contracts; messages travel
//! between contracts.

use crate::tx::Transaction;
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, AssetCode, MessageSignature, RejectionCode, Timestamp, TxId};
use smartledger_permissions::{AmendmentField, ProposalType};
use smartledger_state::{Agreement, AgreementTerms, Asset, AssetTerms, Contract, ContractTerms};
use strum_macros::AsRefStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    // === Contract ===
    ContractOffer(ContractOffer),
    ContractFormation(ContractFormation),
    ContractAmendment(ContractAmendment),

    // === Asset ===
    AssetDefinition(AssetDefinition),
    AssetCreation(AssetCreation),
    AssetModification(AssetModification),

    // === Agreement ===
    AgreementOffer(AgreementOffer),
    AgreementFormation(AgreementFormation),
    AgreementAmendment(AgreementAmendment),

    // === Transfer ===
    Transfer(Transfer),
    Settlement(Settlement),

    // === Governance ===
    Proposal(Proposal),
    Vote(VoteOpened),
    BallotCast(BallotCast),
    BallotCounted(BallotCounted),
    Result(VoteResult),

    // === Enforcement ===
    Order(Order),
    Freeze(Freeze),
    Thaw(Thaw),
    Confiscation(Confiscation),
    Reconciliation(Reconciliation),

    // === Contract to contract ===
    Message(Message),

    Rejection(Rejection),
}

impl Action {
    /// Short action name for logs
    pub fn name(&self) -> &str {
        self.as_ref()
    }

    /// Whether users send this action to a contract
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Action::ContractOffer(_)
                | Action::ContractAmendment(_)
                | Action::AssetDefinition(_)
                | Action::AssetModification(_)
                | Action::AgreementOffer(_)
                | Action::AgreementAmendment(_)
                | Action::Transfer(_)
                | Action::Proposal(_)
                | Action::BallotCast(_)
                | Action::Order(_)
        )
    }
}

// === Contract ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractOffer {
    pub terms: ContractTerms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFormation {
    pub contract: Contract,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractAmendment {
    pub contract_revision: u32,
    pub amendments: Vec<AmendmentField>,
    /// Result transaction of the vote authorizing these amendments
    #[serde(default)]
    pub ref_txid: Option<TxId>,
}

// === Asset ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDefinition {
    pub terms: AssetTerms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetCreation {
    pub asset: Asset,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetModification {
    pub asset_code: AssetCode,
    pub asset_revision: u32,
    pub amendments: Vec<AmendmentField>,
    #[serde(default)]
    pub ref_txid: Option<TxId>,
}

// === Agreement ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementOffer {
    pub terms: AgreementTerms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementFormation {
    pub agreement: Agreement,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementAmendment {
    pub agreement_revision: u32,
    pub amendments: Vec<AmendmentField>,
    #[serde(default)]
    pub ref_txid: Option<TxId>,
}

// === Transfer ===

/// An index (input or output, depending on context) with a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityIndex {
    pub index: u32,
    pub quantity: u64,
}

impl QuantityIndex {
    pub fn new(index: u32, quantity: u64) -> Self {
        Self { index, quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReceiver {
    pub address: Address,
    pub quantity: u64,
}

/// One asset's movement inside a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransfer {
    /// Output of the transfer transaction paying the authoritative contract
    pub contract_index: u32,
    /// [`AssetCode::BITCOIN`] for bitcoin movements
    pub asset_code: AssetCode,
    /// Input index of each sender with the quantity sent
    pub senders: Vec<QuantityIndex>,
    pub receivers: Vec<AssetReceiver>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub assets: Vec<AssetTransfer>,
    /// Zero means the offer never expires
    #[serde(default)]
    pub offer_expiry: Timestamp,
}

/// Resulting balances for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSettlement {
    /// Input of the settlement transaction spent by the authoritative contract
    pub contract_index: u32,
    pub asset_code: AssetCode,
    /// Output index of each touched address with its settled balance
    pub settlements: Vec<QuantityIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub assets: Vec<AssetSettlement>,
    pub timestamp: Timestamp,
}

// === Governance ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_type: ProposalType,
    /// Scope the vote to one asset's holders
    #[serde(default)]
    pub asset_code: Option<AssetCode>,
    /// Proposed amendments target the contract's agreement
    #[serde(default)]
    pub amends_agreement: bool,
    pub vote_system: u32,
    #[serde(default)]
    pub proposed_amendments: Vec<AmendmentField>,
    /// One character per option
    pub vote_options: String,
    pub vote_max: u32,
    pub vote_cutoff: Timestamp,
    #[serde(default)]
    pub description: String,
}

/// Opens a vote; its transaction id identifies the vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOpened {
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCast {
    pub vote_txid: TxId,
    /// Chosen options in preference order
    pub vote: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotCounted {
    pub vote_txid: TxId,
    pub vote: String,
    pub quantity: u64,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteResult {
    pub vote_txid: TxId,
    #[serde(default)]
    pub asset_code: Option<AssetCode>,
    #[serde(default)]
    pub proposed_amendments: Vec<AmendmentField>,
    pub option_tally: Vec<u64>,
    /// Winning options, empty when no option passed
    pub result: String,
    pub timestamp: Timestamp,
}

// === Enforcement ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceAction {
    Freeze,
    Thaw,
    Confiscation,
    Reconciliation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAddress {
    pub address: Address,
    pub quantity: u64,
}

/// Oracle signature backing an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAuthority {
    pub name: String,
    pub signature: MessageSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub compliance_action: ComplianceAction,
    /// No asset means the whole contract (freeze/thaw only)
    #[serde(default)]
    pub asset_code: Option<AssetCode>,
    #[serde(default)]
    pub target_addresses: Vec<TargetAddress>,
    /// Freeze being lifted by a thaw
    #[serde(default)]
    pub freeze_txid: Option<TxId>,
    /// Freeze expiry, zero for indefinite
    #[serde(default)]
    pub freeze_period: Timestamp,
    /// Receiver of confiscated tokens
    #[serde(default)]
    pub deposit_address: Option<Address>,
    #[serde(default)]
    pub authority: Option<OrderAuthority>,
    /// Bitcoin paid to targets by a reconciliation, indexed by target
    #[serde(default)]
    pub bitcoin_dispersions: Vec<QuantityIndex>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freeze {
    #[serde(default)]
    pub asset_code: Option<AssetCode>,
    /// Output index of each frozen address with the frozen quantity
    pub quantities: Vec<QuantityIndex>,
    pub freeze_period: Timestamp,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thaw {
    pub freeze_txid: TxId,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confiscation {
    pub asset_code: AssetCode,
    /// Output index of each target with its remaining balance
    pub quantities: Vec<QuantityIndex>,
    /// Deposit address balance after the confiscation
    pub deposit_qty: u64,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub asset_code: AssetCode,
    /// Output index of each target with its remaining balance
    pub quantities: Vec<QuantityIndex>,
    pub timestamp: Timestamp,
}

// === Messages ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Partially built settlement passed to the next contract
    SettlementRequest {
        transfer_txid: TxId,
        settlement: Box<Transaction>,
    },
    /// Complete settlement passed back for co-signing
    SignatureRequest {
        transfer_txid: TxId,
        settlement: Box<Transaction>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub payload: MessagePayload,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn transfer_txid(&self) -> TxId {
        match &self.payload {
            MessagePayload::SettlementRequest { transfer_txid, .. }
            | MessagePayload::SignatureRequest { transfer_txid, .. } => *transfer_txid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: RejectionCode,
    #[serde(default)]
    pub message: String,
    /// Rejected request when it is not the transaction spent by input 0
    #[serde(default)]
    pub ref_txid: Option<TxId>,
    pub timestamp: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tagging() {
        let action = Action::BallotCast(BallotCast {
            vote_txid: TxId::new([1; 32]),
            vote: "A".into(),
        });
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains(r#""type":"ballot_cast""#));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
        assert_eq!(action.name(), "ballot_cast");
        assert!(action.is_request());
    }

    #[test]
    fn test_rejection_is_response() {
        let action = Action::Rejection(Rejection {
            code: RejectionCode::Timeout,
            message: String::new(),
            ref_txid: None,
            timestamp: Timestamp::from_secs(1),
        });
        assert!(!action.is_request());
        assert_eq!(action.name(), "rejection");
    }
}
