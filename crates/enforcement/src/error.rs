//! Enforcement errors

use smartledger_core::{Address, AssetCode, RejectionCode, TxId};
use smartledger_holdings::HoldingsError;
use smartledger_state::StateError;
use smartledger_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnforcementError {
    #[error("Requestor is not the administration or operator: {0}")]
    NotOperator(Address),

    #[error("Contract expired")]
    ContractExpired,

    #[error("Invalid authority signature: {0}")]
    InvalidSignature(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetCode),

    #[error("Enforcement orders not permitted on asset {0}")]
    NotPermitted(AssetCode),

    #[error("Malformed order: {0}")]
    Malformed(String),

    #[error("Freeze not found: {0}")]
    FreezeNotFound(TxId),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Holdings(#[from] HoldingsError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EnforcementError {
    /// Rejection code sent back to the requester
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            EnforcementError::NotOperator(_) => RejectionCode::NotOperator,
            EnforcementError::ContractExpired => RejectionCode::ContractExpired,
            EnforcementError::InvalidSignature(_) => RejectionCode::InvalidSignature,
            EnforcementError::AssetNotFound(_) => RejectionCode::AssetNotFound,
            EnforcementError::NotPermitted(_) => RejectionCode::AssetNotPermitted,
            EnforcementError::Holdings(e) => e.rejection_code(),
            EnforcementError::State(e) => e.rejection_code(),
            _ => RejectionCode::MsgMalformed,
        }
    }
}

pub type EnforcementResult<T> = Result<T, EnforcementError>;
