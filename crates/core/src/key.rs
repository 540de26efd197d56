//! Ed25519 keys and detached signatures
//!
//! Contract actors sign settlement hashes with their [`ContractKey`]; external
//! authorities sign enforcement orders. Signatures travel hex-encoded together
//! with the signer's public key.

use crate::address::Address;
use crate::error::{CoreError, CoreResult};
use ed25519_dalek::{Signature, Signer as DalekSigner, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Detached signature over a message hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSignature {
    /// Public key (hex-encoded, 32 bytes)
    pub public_key: String,
    /// Signature bytes (hex-encoded, 64 bytes)
    pub signature: String,
}

impl MessageSignature {
    /// Parse the embedded public key
    pub fn verifying_key(&self) -> CoreResult<VerifyingKey> {
        parse_public_key(&self.public_key)
    }

    /// Address of the key that produced this signature
    pub fn signer_address(&self) -> CoreResult<Address> {
        Ok(Address::from_public_key(&self.verifying_key()?))
    }

    /// Verify this signature against a payload
    pub fn verify(&self, payload: &[u8]) -> CoreResult<()> {
        let verifying_key = self.verifying_key()?;

        let sig_bytes = hex::decode(&self.signature)
            .map_err(|e| CoreError::InvalidHex(format!("signature: {}", e)))?;
        let sig_array: [u8; 64] = sig_bytes.try_into().map_err(|v: Vec<u8>| {
            CoreError::InvalidLength {
                kind: "Signature",
                expected: 64,
                actual: v.len(),
            }
        })?;
        let signature = Signature::from_bytes(&sig_array);

        verifying_key
            .verify(payload, &signature)
            .map_err(|e| CoreError::SignatureVerificationFailed(e.to_string()))
    }
}

/// Parse a hex-encoded ed25519 public key
pub fn parse_public_key(hex_key: &str) -> CoreResult<VerifyingKey> {
    let pk_bytes =
        hex::decode(hex_key).map_err(|e| CoreError::InvalidHex(format!("public key: {}", e)))?;
    let pk_array: [u8; 32] = pk_bytes.try_into().map_err(|v: Vec<u8>| CoreError::InvalidLength {
        kind: "PublicKey",
        expected: 32,
        actual: v.len(),
    })?;
    VerifyingKey::from_bytes(&pk_array).map_err(|e| CoreError::InvalidKey(e.to_string()))
}

/// Signing key of a contract actor (or any other signer)
#[derive(Clone)]
pub struct ContractKey {
    signing_key: SigningKey,
}

impl ContractKey {
    /// Create from a 32-byte seed (hex-encoded)
    pub fn from_hex(hex_seed: &str) -> CoreResult<Self> {
        let bytes =
            hex::decode(hex_seed.trim()).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| CoreError::InvalidLength {
            kind: "KeySeed",
            expected: 32,
            actual: v.len(),
        })?;
        Ok(Self::from_seed(seed))
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Generate a new random signing key
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Export the seed as hex (for storage)
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.signing_key.verifying_key())
    }

    /// Sign a payload
    pub fn sign(&self, payload: &[u8]) -> MessageSignature {
        let signature = self.signing_key.sign(payload);
        MessageSignature {
            public_key: self.public_key_hex(),
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

impl std::fmt::Debug for ContractKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = ContractKey::generate();
        let sig = key.sign(b"settlement hash");

        assert!(sig.verify(b"settlement hash").is_ok());
        assert!(matches!(
            sig.verify(b"other payload"),
            Err(CoreError::SignatureVerificationFailed(_))
        ));
        assert_eq!(sig.signer_address().unwrap(), key.address());
    }

    #[test]
    fn test_seed_round_trip() {
        let key = ContractKey::generate();
        let restored = ContractKey::from_hex(&key.seed_hex()).unwrap();
        assert_eq!(restored.address(), key.address());
    }

    #[test]
    fn test_bad_public_key_hex() {
        let mut sig = ContractKey::generate().sign(b"x");
        sig.public_key = "zz".to_string();
        assert!(matches!(sig.verify(b"x"), Err(CoreError::InvalidHex(_))));
    }

    #[test]
    fn test_short_signature() {
        let mut sig = ContractKey::generate().sign(b"x");
        sig.signature = "00".repeat(10);
        assert!(matches!(
            sig.verify(b"x"),
            Err(CoreError::InvalidLength { expected: 64, .. })
        ));
    }
}
