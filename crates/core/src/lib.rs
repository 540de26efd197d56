//! SmartLedger Core - Domain types
//!
//! This crate contains the fundamental types used across SmartLedger:
//! - `Address`: 20-byte account address derived from an ed25519 key
//! - `TxId` / `AssetCode`: fixed-size hash identifiers
//! - `Timestamp`: nanosecond timestamps
//! - `RejectionCode`: the symbolic rejection taxonomy
//! - `ContractKey` / `MessageSignature`: ed25519 signing

#[macro_use]
pub mod hash;
pub mod address;
pub mod error;
pub mod key;
pub mod rejection;
pub mod timestamp;

pub use address::Address;
pub use error::{CoreError, CoreResult};
pub use hash::{sha256, AssetCode, TxId};
pub use key::{parse_public_key, ContractKey, MessageSignature};
pub use rejection::RejectionCode;
pub use timestamp::Timestamp;
