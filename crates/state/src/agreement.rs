//! Agreement entity
//!
//! Chapter text links to defined terms with the `[term]()` markup. Formation
//! requires every link to resolve and every definition to be linked from a
//! chapter.
//!
//! Field registry: 1 = chapters (list; element fields 1 title, 2 preamble,
//! 3 articles), 2 = definitions (list; element fields 1 term, 2 definition),
//! 3 = permissions.

use crate::error::{StateError, StateResult};
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, RejectionCode, Timestamp};
use smartledger_permissions::{
    field, Amendable, AmendmentOp, FieldIndexPath, PermissionError, PermissionResult,
    PermissionTable,
};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub children: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    #[serde(default)]
    pub preamble: String,
    #[serde(default)]
    pub articles: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedTerm {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgreementTerms {
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub definitions: Vec<DefinedTerm>,
    #[serde(default)]
    pub permissions: PermissionTable,
}

impl AgreementTerms {
    /// Check that term links and definitions match up
    pub fn validate(&self) -> StateResult<()> {
        let mut defined = HashSet::new();
        for definition in &self.definitions {
            if definition.term.is_empty() {
                return Err(StateError::InvalidAgreement("empty defined term".into()));
            }
            if !defined.insert(definition.term.as_str()) {
                return Err(StateError::InvalidAgreement(format!(
                    "term {:?} defined twice",
                    definition.term
                )));
            }
        }

        let mut referenced: BTreeSet<&str> = BTreeSet::new();
        for chapter in &self.chapters {
            referenced.extend(term_references(&chapter.title));
            referenced.extend(term_references(&chapter.preamble));
            collect_clause_references(&chapter.articles, &mut referenced);
        }

        // Links inside definitions must resolve but do not count as use
        let linked_from_definitions = self
            .definitions
            .iter()
            .flat_map(|d| term_references(&d.definition));
        if let Some(missing) = referenced
            .iter()
            .copied()
            .chain(linked_from_definitions)
            .find(|term| !defined.contains(term))
        {
            return Err(StateError::InvalidAgreement(format!(
                "term {:?} is not defined",
                missing
            )));
        }

        if let Some(unused) = self
            .definitions
            .iter()
            .find(|d| !referenced.contains(d.term.as_str()))
        {
            return Err(StateError::InvalidAgreement(format!(
                "term {:?} is not referenced by any chapter",
                unused.term
            )));
        }

        Ok(())
    }
}

fn collect_clause_references<'a>(clauses: &'a [Clause], out: &mut BTreeSet<&'a str>) {
    for clause in clauses {
        out.extend(term_references(&clause.title));
        out.extend(term_references(&clause.body));
        collect_clause_references(&clause.children, out);
    }
}

/// Terms linked with `[term]()` in a piece of text
pub fn term_references(text: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else { break };
        let term = &after[..close];
        let tail = &after[close + 1..];
        if tail.starts_with("()") && !term.is_empty() && !term.contains('[') {
            terms.push(term);
            rest = &tail[2..];
        } else {
            rest = after;
        }
    }
    terms
}

/// Formed agreement, one per contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub contract: Address,
    pub revision: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub terms: AgreementTerms,
}

impl Agreement {
    pub fn new(contract: Address, terms: AgreementTerms, now: Timestamp) -> Self {
        Self {
            contract,
            revision: 0,
            created_at: now,
            updated_at: now,
            terms,
        }
    }
}

fn modify_chapter(
    path: &FieldIndexPath,
) -> impl FnOnce(&mut Chapter, &[u32], &[u8]) -> PermissionResult<Vec<u32>> + '_ {
    move |chapter, sub, data| {
        let op = AmendmentOp::Modify;
        let rest = &sub[1..];
        match sub[0] {
            1 => field::set(&mut chapter.title, path, op, rest, data)?,
            2 => field::set(&mut chapter.preamble, path, op, rest, data)?,
            3 => field::apply_list(
                &mut chapter.articles,
                path,
                op,
                rest,
                data,
                field::no_subfields(path),
            )?,
            _ => return Err(PermissionError::UnknownField(path.clone())),
        };
        Ok(vec![sub[0]])
    }
}

fn modify_definition(
    path: &FieldIndexPath,
) -> impl FnOnce(&mut DefinedTerm, &[u32], &[u8]) -> PermissionResult<Vec<u32>> + '_ {
    move |definition, sub, data| {
        let op = AmendmentOp::Modify;
        let rest = &sub[1..];
        match sub[0] {
            1 => field::set(&mut definition.term, path, op, rest, data)?,
            2 => field::set(&mut definition.definition, path, op, rest, data)?,
            _ => return Err(PermissionError::UnknownField(path.clone())),
        };
        Ok(vec![sub[0]])
    }
}

impl Amendable for Agreement {
    fn revision(&self) -> u32 {
        self.revision
    }

    fn set_revision(&mut self, revision: u32) {
        self.revision = revision;
    }

    fn permissions(&self) -> &PermissionTable {
        &self.terms.permissions
    }

    fn apply_field(
        &mut self,
        path: &FieldIndexPath,
        op: AmendmentOp,
        data: &[u8],
    ) -> PermissionResult<FieldIndexPath> {
        let indices = path.as_slice();
        let (head, rest) = match indices.split_first() {
            Some((head, rest)) => (*head, rest),
            None => return Err(PermissionError::UnknownField(path.clone())),
        };

        let t = &mut self.terms;
        let tail = match head {
            1 => field::apply_list(&mut t.chapters, path, op, rest, data, modify_chapter(path))?,
            2 => field::apply_list(&mut t.definitions, path, op, rest, data, modify_definition(path))?,
            3 => field::set(&mut t.permissions, path, op, rest, data)?,
            _ => return Err(PermissionError::UnknownField(path.clone())),
        };
        Ok(FieldIndexPath::new(vec![head]).join(&tail))
    }

    fn validate(&self) -> PermissionResult<()> {
        self.terms
            .validate()
            .map_err(|e| PermissionError::InvalidEntity(e.to_string()))
    }

    fn permission_rejection(&self) -> RejectionCode {
        RejectionCode::ContractPermissions
    }
}
