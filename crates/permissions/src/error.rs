//! Permission and amendment errors

use crate::amendment::AmendmentOp;
use crate::fip::FieldIndexPath;
use smartledger_core::RejectionCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Revision mismatch: expected {expected}, current {current}")]
    RevisionMismatch { expected: u32, current: u32 },

    #[error("Amendment {index} has no field specified")]
    EmptyPath { index: usize },

    #[error("Unknown field {0}")]
    UnknownField(FieldIndexPath),

    #[error("Index {index} out of range for {path} (length {len})")]
    IndexOutOfRange {
        path: FieldIndexPath,
        index: u32,
        len: usize,
    },

    #[error("Operation {op} not supported on {path}")]
    InvalidOperation { path: FieldIndexPath, op: AmendmentOp },

    #[error("Invalid data for {path}: {reason}")]
    InvalidData { path: FieldIndexPath, reason: String },

    #[error("Field {0} is not covered by the permission table")]
    NoPermission(FieldIndexPath),

    #[error("Field {path} amendment not permitted: {reason}")]
    NotPermitted {
        path: FieldIndexPath,
        reason: String,
        code: RejectionCode,
    },

    #[error("Field {path} voting system {system} out of range")]
    VotingSystemOutOfRange { path: FieldIndexPath, system: u32 },

    #[error("Vote result {0:?} does not accept amendments")]
    VoteNotAccepted(String),

    #[error("Invalid permissions: {0}")]
    InvalidPermissions(String),

    #[error("Entity invalid after amendments: {0}")]
    InvalidEntity(String),
}

impl PermissionError {
    /// Rejection code sent back to the requester
    pub fn rejection_code(&self) -> RejectionCode {
        match self {
            PermissionError::NotPermitted { code, .. } => *code,
            _ => RejectionCode::MsgMalformed,
        }
    }
}

pub type PermissionResult<T> = Result<T, PermissionError>;
