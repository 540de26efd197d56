//! Fixed-size hash identifiers
//!
//! Transaction ids are 32 bytes, asset codes are 20 bytes. Both travel as
//! lowercase hex strings in JSON and in storage keys.

use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

macro_rules! hash_type {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, $crate::error::CoreError> {
                let array: [u8; $len] =
                    bytes.try_into().map_err(|_| $crate::error::CoreError::InvalidLength {
                        kind: stringify!($name),
                        expected: $len,
                        actual: bytes.len(),
                    })?;
                Ok(Self(array))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|e| $crate::error::CoreError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::error::CoreError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_type!(
    /// Transaction id (double role: identifies requests, responses and holding statuses)
    TxId,
    32
);

hash_type!(
    /// Asset code, unique within a contract
    AssetCode,
    20
);

impl TxId {
    /// Hash arbitrary content into a transaction id
    pub fn hash_of(data: &[u8]) -> Self {
        Self(sha256(data))
    }
}

impl AssetCode {
    /// Sentinel code for bitcoin-denominated movements
    pub const BITCOIN: AssetCode = AssetCode([0u8; 20]);

    /// Derive the code of the asset at `index` inside a contract
    pub fn derive(contract: &crate::Address, index: u64) -> Self {
        let mut data = contract.as_bytes().to_vec();
        data.extend_from_slice(&index.to_le_bytes());
        let digest = sha256(&data);
        let mut code = [0u8; 20];
        code.copy_from_slice(&digest[..20]);
        Self(code)
    }

    pub fn is_bitcoin(&self) -> bool {
        self.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::Address;

    #[test]
    fn test_txid_hex_round_trip() {
        let txid = TxId::hash_of(b"transfer");
        let parsed: TxId = txid.to_string().parse().unwrap();
        assert_eq!(parsed, txid);
    }

    #[test]
    fn test_invalid_length_rejected() {
        let err = "abcd".parse::<TxId>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidLength { expected: 32, actual: 2, .. }));
    }

    #[test]
    fn test_asset_code_derivation_is_per_index() {
        let contract = Address::new([7u8; 20]);
        let first = AssetCode::derive(&contract, 0);
        let second = AssetCode::derive(&contract, 1);
        assert_ne!(first, second);
        assert!(!first.is_bitcoin());
        assert!(AssetCode::BITCOIN.is_bitcoin());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let code = AssetCode::new([0xab; 20]);
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: AssetCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
