//! Field registry helpers
//!
//! Entities enumerate their addressable fields with a `match` on the first
//! path index and delegate to these helpers, which apply the operation and
//! report the canonical tail (the path with list element indices removed).

use crate::amendment::AmendmentOp;
use crate::error::{PermissionError, PermissionResult};
use crate::fip::FieldIndexPath;
use serde::de::DeserializeOwned;

/// Decode amendment data for `path`
pub fn decode<T: DeserializeOwned>(path: &FieldIndexPath, data: &[u8]) -> PermissionResult<T> {
    serde_json::from_slice(data).map_err(|e| PermissionError::InvalidData {
        path: path.clone(),
        reason: e.to_string(),
    })
}

/// Replace a scalar or whole-struct field
pub fn set<T: DeserializeOwned>(
    target: &mut T,
    path: &FieldIndexPath,
    op: AmendmentOp,
    rest: &[u32],
    data: &[u8],
) -> PermissionResult<Vec<u32>> {
    if !rest.is_empty() {
        return Err(PermissionError::UnknownField(path.clone()));
    }
    if op != AmendmentOp::Modify {
        return Err(PermissionError::InvalidOperation {
            path: path.clone(),
            op,
        });
    }
    *target = decode(path, data)?;
    Ok(Vec::new())
}

/// Apply an operation to a list field
///
/// `rest` is the path below the list field: empty for `AddElement`,
/// `[index]` for `DeleteElement` and whole-element `Modify`, and
/// `[index, sub..]` for nested modifications, which `modify_element` handles.
pub fn apply_list<T, F>(
    list: &mut Vec<T>,
    path: &FieldIndexPath,
    op: AmendmentOp,
    rest: &[u32],
    data: &[u8],
    modify_element: F,
) -> PermissionResult<Vec<u32>>
where
    T: DeserializeOwned,
    F: FnOnce(&mut T, &[u32], &[u8]) -> PermissionResult<Vec<u32>>,
{
    match op {
        AmendmentOp::AddElement => {
            if !rest.is_empty() {
                return Err(PermissionError::InvalidOperation {
                    path: path.clone(),
                    op,
                });
            }
            list.push(decode(path, data)?);
            Ok(Vec::new())
        }
        AmendmentOp::DeleteElement => {
            let index = element_index(list.len(), path, rest)?;
            if rest.len() != 1 {
                return Err(PermissionError::InvalidOperation {
                    path: path.clone(),
                    op,
                });
            }
            list.remove(index);
            Ok(Vec::new())
        }
        AmendmentOp::Modify => {
            let index = element_index(list.len(), path, rest)?;
            let sub = &rest[1..];
            if sub.is_empty() {
                list[index] = decode(path, data)?;
                Ok(Vec::new())
            } else {
                modify_element(&mut list[index], sub, data)
            }
        }
    }
}

/// Element handler for lists whose elements have no addressable subfields
pub fn no_subfields<T>(path: &FieldIndexPath) -> impl FnOnce(&mut T, &[u32], &[u8]) -> PermissionResult<Vec<u32>> + '_ {
    move |_, _, _| Err(PermissionError::UnknownField(path.clone()))
}

fn element_index(len: usize, path: &FieldIndexPath, rest: &[u32]) -> PermissionResult<usize> {
    let index = *rest
        .first()
        .ok_or_else(|| PermissionError::UnknownField(path.clone()))?;
    if index as usize >= len {
        return Err(PermissionError::IndexOutOfRange {
            path: path.clone(),
            index,
            len,
        });
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> FieldIndexPath {
        FieldIndexPath::from([5])
    }

    #[test]
    fn test_set_scalar() {
        let mut value = 1u64;
        set(&mut value, &path(), AmendmentOp::Modify, &[], b"7").unwrap();
        assert_eq!(value, 7);

        assert!(matches!(
            set(&mut value, &path(), AmendmentOp::AddElement, &[], b"7"),
            Err(PermissionError::InvalidOperation { .. })
        ));
        assert!(matches!(
            set(&mut value, &path(), AmendmentOp::Modify, &[1], b"7"),
            Err(PermissionError::UnknownField(_))
        ));
        assert!(matches!(
            set(&mut value, &path(), AmendmentOp::Modify, &[], b"\"x\""),
            Err(PermissionError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_list_operations() {
        let p = path();
        let mut list = vec!["a".to_string(), "b".to_string()];

        apply_list(&mut list, &p, AmendmentOp::AddElement, &[], br#""c""#, no_subfields(&p)).unwrap();
        assert_eq!(list, vec!["a", "b", "c"]);

        apply_list(&mut list, &p, AmendmentOp::Modify, &[0], br#""z""#, no_subfields(&p)).unwrap();
        assert_eq!(list[0], "z");

        apply_list(&mut list, &p, AmendmentOp::DeleteElement, &[1], &[], no_subfields(&p)).unwrap();
        assert_eq!(list, vec!["z", "c"]);
    }

    #[test]
    fn test_delete_out_of_range() {
        let p = path();
        let mut list = vec![1u32];
        let err = apply_list(&mut list, &p, AmendmentOp::DeleteElement, &[3], &[], no_subfields(&p))
            .unwrap_err();
        assert_eq!(
            err,
            PermissionError::IndexOutOfRange {
                path: p,
                index: 3,
                len: 1
            }
        );
        assert_eq!(list, vec![1]);
    }

    #[test]
    fn test_nested_modify_delegates() {
        let p = path();
        let mut list = vec![(1u32, 2u32)];
        let tail = apply_list(&mut list, &p, AmendmentOp::Modify, &[0, 2], b"9", |elem, sub, data| {
            assert_eq!(sub, &[2]);
            elem.1 = decode(&p, data)?;
            Ok(sub.to_vec())
        })
        .unwrap();
        assert_eq!(tail, vec![2]);
        assert_eq!(list[0], (1, 9));
    }
}
