//! Amendment payloads

use crate::error::{PermissionError, PermissionResult};
use crate::fip::FieldIndexPath;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Operation applied at the amendment's path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AmendmentOp {
    /// Replace the addressed field or list element
    Modify,
    /// Append an element to the addressed list
    AddElement,
    /// Remove the addressed list element
    DeleteElement,
}

/// One field change
///
/// `data` holds the JSON encoding of the replacement value (or of the new list
/// element). It is empty for deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentField {
    pub field_index_path: FieldIndexPath,
    pub operation: AmendmentOp,
    #[serde(with = "hex_bytes", default)]
    pub data: Vec<u8>,
}

impl AmendmentField {
    pub fn new(path: impl Into<FieldIndexPath>, operation: AmendmentOp, data: Vec<u8>) -> Self {
        Self {
            field_index_path: path.into(),
            operation,
            data,
        }
    }

    /// Build an amendment whose data is the JSON encoding of `value`
    pub fn encode<T: Serialize>(
        path: impl Into<FieldIndexPath>,
        operation: AmendmentOp,
        value: &T,
    ) -> PermissionResult<Self> {
        let path = path.into();
        let data = serde_json::to_vec(value).map_err(|e| PermissionError::InvalidData {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(path, operation, data))
    }

    pub fn modify<T: Serialize>(path: impl Into<FieldIndexPath>, value: &T) -> PermissionResult<Self> {
        Self::encode(path, AmendmentOp::Modify, value)
    }

    pub fn add_element<T: Serialize>(
        path: impl Into<FieldIndexPath>,
        value: &T,
    ) -> PermissionResult<Self> {
        Self::encode(path, AmendmentOp::AddElement, value)
    }

    pub fn delete_element(path: impl Into<FieldIndexPath>) -> Self {
        Self::new(path, AmendmentOp::DeleteElement, Vec::new())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_json_data() {
        let amendment = AmendmentField::modify([1], &"New Name").unwrap();
        assert_eq!(amendment.data, br#""New Name""#.to_vec());
        assert_eq!(amendment.operation, AmendmentOp::Modify);
    }

    #[test]
    fn test_serde_hex_data() {
        let amendment = AmendmentField::modify([3], &42u64).unwrap();
        let json = serde_json::to_string(&amendment).unwrap();
        assert!(json.contains(r#""data":"3432""#));
        assert!(json.contains(r#""operation":"modify""#));
        let back: AmendmentField = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amendment);
    }

    #[test]
    fn test_op_parse() {
        assert_eq!("add_element".parse::<AmendmentOp>().unwrap(), AmendmentOp::AddElement);
        assert_eq!(AmendmentOp::DeleteElement.to_string(), "delete_element");
    }
}
