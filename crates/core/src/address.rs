//! Ledger addresses
//!
//! An address is the first 20 bytes of the SHA-256 of an ed25519 verifying key.
//! Contracts, administrators and holders all share the same address space.

use crate::hash::sha256;
use ed25519_dalek::VerifyingKey;

hash_type!(
    /// 20-byte account address
    Address,
    20
);

impl Address {
    /// Derive the address owned by a public key
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = sha256(key.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        Self(bytes)
    }
}
