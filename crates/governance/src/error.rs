//! Governance errors

use smartledger_core::{Address, AssetCode, RejectionCode, TxId};
use smartledger_holdings::HoldingsError;
use smartledger_permissions::{FieldIndexPath, PermissionError};
use smartledger_state::StateError;
use smartledger_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Vote not found: {0}")]
    NotFound(TxId),

    #[error("Vote closed: {0}")]
    Closed(TxId),

    #[error("Vote already complete: {0}")]
    AlreadyComplete(TxId),

    #[error("Vote not complete: {0}")]
    NotComplete(TxId),

    #[error("Vote amendments already applied in {0}")]
    AlreadyApplied(TxId),

    #[error("Address not eligible to vote: {0}")]
    NotEligible(Address),

    #[error("Invalid ballot: {0}")]
    InvalidBallot(String),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Initiator is not the administration or operator: {0}")]
    NotOperator(Address),

    #[error("Initiator holds no voting balance: {0}")]
    NotHolder(Address),

    #[error("Voting system not permitted: {0}")]
    VoteSystemNotPermitted(String),

    #[error("Proposals not permitted: {reason}")]
    ProposalsNotPermitted { reason: String, code: RejectionCode },

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetCode),

    #[error("Asset frozen: {0}")]
    AssetFrozen(AssetCode),

    #[error("Field {path} already proposed by unapplied vote {vote_txid}")]
    Conflict { vote_txid: TxId, path: FieldIndexPath },

    #[error("Amendments do not match vote {vote_txid}: {reason}")]
    AmendmentMismatch { vote_txid: TxId, reason: String },

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Holdings(#[from] HoldingsError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl VoteError {
    /// Rejection code sent back to the requester
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            VoteError::NotFound(_) => RejectionCode::VoteNotFound,
            VoteError::Closed(_) => RejectionCode::VoteClosed,
            VoteError::NotEligible(_) => RejectionCode::UnauthorizedAddress,
            VoteError::NotOperator(_) => RejectionCode::NotOperator,
            VoteError::NotHolder(_) => RejectionCode::InsufficientQuantity,
            VoteError::VoteSystemNotPermitted(_) => RejectionCode::VoteSystemNotPermitted,
            VoteError::ProposalsNotPermitted { code, .. } => *code,
            VoteError::AssetNotFound(_) => RejectionCode::AssetNotFound,
            VoteError::AssetFrozen(_) => RejectionCode::AssetFrozen,
            VoteError::Conflict { .. } => RejectionCode::ProposalConflicts,
            VoteError::Permission(e) => e.rejection_code(),
            VoteError::Holdings(e) => e.rejection_code(),
            VoteError::State(e) => e.rejection_code(),
            _ => RejectionCode::MsgMalformed,
        }
    }
}

pub type GovernanceResult<T> = Result<T, VoteError>;
