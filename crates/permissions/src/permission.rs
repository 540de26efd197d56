//! Field-level permission tables

use crate::error::{PermissionError, PermissionResult};
use crate::fip::FieldIndexPath;
use serde::{Deserialize, Serialize};

/// Authorization gates for a set of fields
///
/// A permission with an empty `fields` list is the table default and applies
/// to every field not named by a more specific permission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permission {
    /// Administration can amend directly, without a vote
    #[serde(default)]
    pub permitted: bool,

    /// Amendable through an administration proposal
    #[serde(default)]
    pub administration_proposal: bool,

    /// Amendable through a holder proposal
    #[serde(default)]
    pub holder_proposal: bool,

    /// Amendable through an administrative-matter vote
    #[serde(default)]
    pub administrative_matter: bool,

    /// One flag per contract voting system
    #[serde(default)]
    pub voting_systems_allowed: Vec<bool>,

    /// Canonical field paths covered by this permission
    #[serde(default)]
    pub fields: Vec<FieldIndexPath>,
}

impl Permission {
    /// Directly amendable by the administration, no votes
    pub fn permitted(voting_systems: usize) -> Self {
        Self {
            permitted: true,
            voting_systems_allowed: vec![false; voting_systems],
            ..Default::default()
        }
    }

    /// Amendable only through proposals on every voting system
    pub fn by_proposal(voting_systems: usize) -> Self {
        Self {
            administration_proposal: true,
            holder_proposal: true,
            administrative_matter: true,
            voting_systems_allowed: vec![true; voting_systems],
            ..Default::default()
        }
    }

    /// Not amendable at all
    pub fn locked(voting_systems: usize) -> Self {
        Self {
            voting_systems_allowed: vec![false; voting_systems],
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldIndexPath>) -> Self {
        self.fields = fields;
        self
    }

    pub fn is_default(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Ordered list of permissions for one entity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionTable(Vec<Permission>);

impl PermissionTable {
    pub fn new(permissions: Vec<Permission>) -> Self {
        Self(permissions)
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check structure against the entity's voting system count
    pub fn validate(&self, voting_systems: usize) -> PermissionResult<()> {
        let mut defaults = 0;
        for (i, permission) in self.0.iter().enumerate() {
            if permission.voting_systems_allowed.len() != voting_systems {
                return Err(PermissionError::InvalidPermissions(format!(
                    "permission {} lists {} voting systems, contract has {}",
                    i,
                    permission.voting_systems_allowed.len(),
                    voting_systems
                )));
            }
            if permission.is_default() {
                defaults += 1;
            }
            if permission.fields.iter().any(|f| f.is_empty()) {
                return Err(PermissionError::InvalidPermissions(format!(
                    "permission {} has an empty field path",
                    i
                )));
            }
        }
        if defaults > 1 {
            return Err(PermissionError::InvalidPermissions(
                "more than one default permission".to_string(),
            ));
        }
        Ok(())
    }

    /// Permission governing a canonical field path
    ///
    /// The longest matching field prefix wins; the default permission covers
    /// everything else. `None` means the field is excluded from the table.
    pub fn lookup(&self, field: &FieldIndexPath) -> Option<&Permission> {
        let mut best: Option<(usize, &Permission)> = None;
        for permission in &self.0 {
            for covered in &permission.fields {
                if field.starts_with(covered)
                    && best.map_or(true, |(len, _)| covered.len() > len)
                {
                    best = Some((covered.len(), permission));
                }
            }
        }

        best.map(|(_, p)| p)
            .or_else(|| self.0.iter().find(|p| p.is_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PermissionTable {
        PermissionTable::new(vec![
            Permission::locked(1),
            Permission::permitted(1).with_fields(vec![FieldIndexPath::from([12])]),
            Permission::by_proposal(1).with_fields(vec![FieldIndexPath::from([12, 1])]),
        ])
    }

    #[test]
    fn test_lookup_most_specific() {
        let table = table();

        assert!(table.lookup(&FieldIndexPath::from([12, 1])).unwrap().holder_proposal);
        assert!(table.lookup(&FieldIndexPath::from([12, 2])).unwrap().permitted);
        assert!(!table.lookup(&FieldIndexPath::from([3])).unwrap().permitted);
    }

    #[test]
    fn test_lookup_without_default() {
        let table = PermissionTable::new(vec![
            Permission::permitted(0).with_fields(vec![FieldIndexPath::from([1])]),
        ]);
        assert!(table.lookup(&FieldIndexPath::from([2])).is_none());
    }

    #[test]
    fn test_validate_voting_system_count() {
        assert!(table().validate(1).is_ok());
        assert!(matches!(
            table().validate(2),
            Err(PermissionError::InvalidPermissions(_))
        ));
    }

    #[test]
    fn test_validate_single_default() {
        let table = PermissionTable::new(vec![Permission::locked(0), Permission::permitted(0)]);
        assert!(table.validate(0).is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"[{ "permitted": true }]"#;
        let table: PermissionTable = serde_json::from_str(json).unwrap();
        assert!(table.permissions()[0].permitted);
        assert!(table.permissions()[0].fields.is_empty());
    }
}
