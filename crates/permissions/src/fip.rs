//! Field index paths
//!
//! A path addresses a field inside an entity: the first element is the
//! field index, list fields are followed by an element index, and nested
//! structures continue with their own field indices. `[12, 1, 1]` reads
//! "oracles → element #1 → entity contract".
//!
//! Permission tables use *canonical* paths, which omit list element indices
//! (`[12, 1]` for the example above), so one permission covers every element.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldIndexPath(Vec<u32>);

impl FieldIndexPath {
    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `prefix` is a leading part of this path (or equal to it)
    pub fn starts_with(&self, prefix: &FieldIndexPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// New path with `tail` appended
    pub fn join(&self, tail: &[u32]) -> Self {
        let mut indices = self.0.clone();
        indices.extend_from_slice(tail);
        Self(indices)
    }
}

impl From<Vec<u32>> for FieldIndexPath {
    fn from(indices: Vec<u32>) -> Self {
        Self(indices)
    }
}

impl<const N: usize> From<[u32; N]> for FieldIndexPath {
    fn from(indices: [u32; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for FieldIndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", parts.join("."))
    }
}

impl FromStr for FieldIndexPath {
    type Err = std::num::ParseIntError;

    /// Parses `1.2.3` (brackets optional)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        trimmed
            .split('.')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let path = FieldIndexPath::from([12, 1, 1]);
        assert_eq!(path.to_string(), "[12.1.1]");
        assert_eq!("12.1.1".parse::<FieldIndexPath>().unwrap(), path);
        assert_eq!("[12.1.1]".parse::<FieldIndexPath>().unwrap(), path);
        assert!("".parse::<FieldIndexPath>().unwrap().is_empty());
        assert!("1.x".parse::<FieldIndexPath>().is_err());
    }

    #[test]
    fn test_prefix_and_join() {
        let path = FieldIndexPath::from([8, 2]);
        assert!(path.starts_with(&FieldIndexPath::from([8])));
        assert!(!path.starts_with(&FieldIndexPath::from([9])));
        assert_eq!(FieldIndexPath::from([8]).join(&[2]), path);
    }
}
