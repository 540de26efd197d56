//! Node errors

use smartledger_core::{CoreError, RejectionCode};
use smartledger_enforcement::EnforcementError;
use smartledger_governance::VoteError;
use smartledger_holdings::HoldingsError;
use smartledger_permissions::PermissionError;
use smartledger_protocol::ProtocolError;
use smartledger_settlement::SettlementError;
use smartledger_state::StateError;
use smartledger_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Rejected ({code}): {message}")]
    Rejected { code: RejectionCode, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Holdings(#[from] HoldingsError),

    #[error(transparent)]
    Vote(#[from] VoteError),

    #[error(transparent)]
    Enforcement(#[from] EnforcementError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl NodeError {
    pub fn rejected(code: RejectionCode, message: impl Into<String>) -> Self {
        NodeError::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Rejection code for a request that failed validation
    ///
    /// `None` means the failure is local (storage, encoding) and is surfaced
    /// to the caller instead of being answered on chain.
    pub fn rejection(&self) -> Option<RejectionCode> {
        match self {
            NodeError::Rejected { code, .. } => Some(*code),
            NodeError::Permission(e) => Some(e.rejection_code()),
            NodeError::State(e) => (!is_storage_state(e)).then(|| e.rejection_code()),
            NodeError::Holdings(e) => (!matches!(e, HoldingsError::Storage(_))).then(|| e.rejection_code()),
            NodeError::Vote(e) => match e {
                VoteError::Storage(_) | VoteError::Holdings(HoldingsError::Storage(_)) => None,
                VoteError::State(inner) if is_storage_state(inner) => None,
                e => Some(e.rejection_code()),
            },
            NodeError::Enforcement(e) => match e {
                EnforcementError::Storage(_)
                | EnforcementError::Serialization(_)
                | EnforcementError::Holdings(HoldingsError::Storage(_)) => None,
                EnforcementError::State(inner) if is_storage_state(inner) => None,
                e => Some(e.rejection_code()),
            },
            NodeError::Settlement(e) => e.is_rejection().then(|| e.rejection_code()),
            NodeError::Protocol(ProtocolError::InsufficientFunding { .. }) => {
                Some(RejectionCode::InsufficientTxFeeFunding)
            }
            _ => None,
        }
    }
}

fn is_storage_state(e: &StateError) -> bool {
    matches!(e, StateError::Storage(_))
}

pub type NodeResult<T> = Result<T, NodeError>;
