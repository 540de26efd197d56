//! Core parsing and key errors

use thiserror::Error;

/// Errors raised while parsing or building core types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid length for {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
