//! Settlement errors

use crate::state::TransferState;
use smartledger_core::{Address, AssetCode, RejectionCode, TxId};
use smartledger_holdings::HoldingsError;
use smartledger_protocol::ProtocolError;
use smartledger_state::StateError;
use smartledger_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Malformed transfer: {0}")]
    Malformed(String),

    #[error("Transfer offer expired")]
    TransferExpired,

    #[error("Contract moved to {0}")]
    ContractMoved(Address),

    #[error("Contract frozen")]
    ContractFrozen,

    #[error("Contract expired")]
    ContractExpired,

    #[error("Contract not found: {0}")]
    ContractNotFound(Address),

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetCode),

    #[error("Asset frozen: {0}")]
    AssetFrozen(AssetCode),

    #[error("Transfers of {0} are restricted to the administration")]
    TransfersNotPermitted(AssetCode),

    #[error("Invalid settlement signature on input {0}")]
    InvalidSignature(usize),

    #[error("Transfer timed out")]
    Timeout,

    #[error("Rejected by another contract ({code}): {message}")]
    PeerRejected { code: RejectionCode, message: String },

    #[error("Transfer not found: {0}")]
    TransferNotFound(TxId),

    #[error("Invalid transfer state transition: {from} -> {to}")]
    InvalidTransition { from: TransferState, to: TransferState },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Holdings(#[from] HoldingsError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SettlementError {
    /// Whether the failure is answered with a rejection rather than surfaced
    pub fn is_rejection(&self) -> bool {
        match self {
            SettlementError::Malformed(_)
            | SettlementError::TransferExpired
            | SettlementError::ContractMoved(_)
            | SettlementError::ContractFrozen
            | SettlementError::ContractExpired
            | SettlementError::AssetNotFound(_)
            | SettlementError::AssetFrozen(_)
            | SettlementError::TransfersNotPermitted(_)
            | SettlementError::InvalidSignature(_)
            | SettlementError::Timeout
            | SettlementError::PeerRejected { .. } => true,
            SettlementError::Holdings(e) => !matches!(e, HoldingsError::Storage(_)),
            SettlementError::Protocol(e) => matches!(e, ProtocolError::InsufficientFunding { .. }),
            _ => false,
        }
    }

    /// Rejection code sent back to the requester
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            SettlementError::TransferExpired => RejectionCode::TransferExpired,
            SettlementError::ContractMoved(_) => RejectionCode::ContractMoved,
            SettlementError::ContractFrozen => RejectionCode::ContractFrozen,
            SettlementError::ContractExpired => RejectionCode::ContractExpired,
            SettlementError::AssetNotFound(_) => RejectionCode::AssetNotFound,
            SettlementError::AssetFrozen(_) => RejectionCode::AssetFrozen,
            SettlementError::TransfersNotPermitted(_) => RejectionCode::AssetNotPermitted,
            SettlementError::InvalidSignature(_) => RejectionCode::InvalidSignature,
            SettlementError::Timeout => RejectionCode::Timeout,
            SettlementError::PeerRejected { code, .. } => *code,
            SettlementError::Holdings(e) => e.rejection_code(),
            SettlementError::Protocol(ProtocolError::InsufficientFunding { .. }) => {
                RejectionCode::InsufficientTxFeeFunding
            }
            _ => RejectionCode::MsgMalformed,
        }
    }
}

pub type SettlementResult<T> = Result<T, SettlementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holdings_codes_pass_through() {
        let err = SettlementError::from(HoldingsError::HoldingsLocked);
        assert!(err.is_rejection());
        assert_eq!(err.rejection_code(), RejectionCode::HoldingsLocked);

        let err = SettlementError::from(HoldingsError::InsufficientHoldings {
            available: 1,
            requested: 2,
        });
        assert_eq!(err.rejection_code(), RejectionCode::InsufficientQuantity);
    }

    #[test]
    fn test_funding_shortfall_is_rejection() {
        let err = SettlementError::from(ProtocolError::InsufficientFunding {
            required: 10,
            available: 1,
        });
        assert!(err.is_rejection());
        assert_eq!(err.rejection_code(), RejectionCode::InsufficientTxFeeFunding);
        assert!(!SettlementError::TransferNotFound(TxId::default()).is_rejection());
    }
}
