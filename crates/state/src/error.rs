//! State errors

use smartledger_core::RejectionCode;
use smartledger_permissions::PermissionError;
use smartledger_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Invalid voting system {index}: {reason}")]
    InvalidVotingSystem { index: usize, reason: String },

    #[error("Invalid agreement: {0}")]
    InvalidAgreement(String),

    #[error("Invalid {entity}: {reason}")]
    Invalid { entity: &'static str, reason: String },
}

impl StateError {
    /// Rejection code sent back to the requester
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            StateError::Permission(e) => e.rejection_code(),
            _ => RejectionCode::MsgMalformed,
        }
    }
}

pub type StateResult<T> = Result<T, StateError>;
