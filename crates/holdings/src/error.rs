//! Holdings errors

use smartledger_core::{RejectionCode, TxId};
use smartledger_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HoldingsError {
    #[error("Duplicate holding entry for {0}")]
    DuplicateEntry(TxId),

    #[error("Insufficient holdings: available {available}, requested {requested}")]
    InsufficientHoldings { available: u64, requested: u64 },

    #[error("Holdings frozen: unfrozen {unfrozen}, requested {requested}")]
    HoldingsFrozen { unfrozen: u64, requested: u64 },

    #[error("Holdings locked by a multi-contract transfer")]
    HoldingsLocked,

    #[error("No holding status for {0}")]
    StatusNotFound(TxId),

    #[error("Holding status for {txid} is not a {expected}")]
    WrongStatus { txid: TxId, expected: &'static str },

    #[error("Holding status for {txid} has amount {actual}, expected {expected}")]
    WrongAmount { txid: TxId, expected: u64, actual: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl HoldingsError {
    /// Rejection code sent back to the requester
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            HoldingsError::InsufficientHoldings { .. } => RejectionCode::InsufficientQuantity,
            HoldingsError::HoldingsFrozen { .. } => RejectionCode::HoldingsFrozen,
            HoldingsError::HoldingsLocked => RejectionCode::HoldingsLocked,
            _ => RejectionCode::MsgMalformed,
        }
    }
}

pub type HoldingsResult<T> = Result<T, HoldingsError>;
