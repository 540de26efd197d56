//! Protocol errors

use smartledger_core::CoreError;
use smartledger_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Insufficient funding: required {required}, available {available}")]
    InsufficientFunding { required: u64, available: u64 },

    #[error("Input {0} out of range")]
    InputOutOfRange(usize),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
