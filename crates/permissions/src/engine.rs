//! Amendment engine
//!
//! ```text
//! AmendmentField[]
//!        │
//!        ▼
//! ┌─────────────────┐
//! │ Revision check  │──► mismatch? MsgMalformed, entity untouched
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Field registry  │──► apply to a working copy, canonical path out
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Permission gate │──► direct: `permitted`; vote: proposal gate +
//! │                 │    voting system + accepted result
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Validate + bump │──► revision + 1, working copy committed
//! └─────────────────┘
//! ```

use crate::amendment::{AmendmentField, AmendmentOp};
use crate::error::{PermissionError, PermissionResult};
use crate::fip::FieldIndexPath;
use crate::permission::{Permission, PermissionTable};
use serde::{Deserialize, Serialize};
use smartledger_core::RejectionCode;
use strum_macros::{Display, EnumString};
use tracing::debug;

/// Vote result that accepts the proposed amendments
pub const ACCEPT_RESULT: &str = "A";

/// Who initiated a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProposalType {
    Administration,
    Holder,
    AdministrativeMatter,
}

/// Authority presented with an amendment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmendmentAuthority {
    /// Direct edit by the administration
    Direct,
    /// Edit backed by a completed vote
    Vote {
        proposal_type: ProposalType,
        voting_system: u32,
        result: String,
    },
}

/// An entity whose fields can be amended by path
pub trait Amendable: Clone {
    fn revision(&self) -> u32;

    fn set_revision(&mut self, revision: u32);

    fn permissions(&self) -> &PermissionTable;

    /// Apply one operation through the entity's field registry and return
    /// the canonical path of the changed field
    fn apply_field(
        &mut self,
        path: &FieldIndexPath,
        op: AmendmentOp,
        data: &[u8],
    ) -> PermissionResult<FieldIndexPath>;

    /// Whole-entity validation after all amendments are applied
    fn validate(&self) -> PermissionResult<()>;

    /// Rejection code for gate failures
    fn permission_rejection(&self) -> RejectionCode;
}

/// Apply amendments under optimistic concurrency
///
/// On success the entity carries the changes and its revision is bumped by
/// exactly one. On failure the entity is unchanged.
pub fn apply_amendments<E: Amendable>(
    entity: &mut E,
    revision_expected: u32,
    amendments: &[AmendmentField],
    authority: &AmendmentAuthority,
) -> PermissionResult<()> {
    if entity.revision() != revision_expected {
        return Err(PermissionError::RevisionMismatch {
            expected: revision_expected,
            current: entity.revision(),
        });
    }

    let mut amended = amend(entity, amendments, authority)?;
    amended.set_revision(entity.revision() + 1);
    *entity = amended;

    debug!(
        revision = entity.revision(),
        count = amendments.len(),
        "amendments applied"
    );
    Ok(())
}

/// Check that proposed amendments would be applicable if the vote passes
pub fn preview_amendments<E: Amendable>(
    entity: &E,
    amendments: &[AmendmentField],
    proposal_type: ProposalType,
    voting_system: u32,
) -> PermissionResult<E> {
    let authority = AmendmentAuthority::Vote {
        proposal_type,
        voting_system,
        result: ACCEPT_RESULT.to_string(),
    };
    amend(entity, amendments, &authority)
}

fn amend<E: Amendable>(
    entity: &E,
    amendments: &[AmendmentField],
    authority: &AmendmentAuthority,
) -> PermissionResult<E> {
    if let AmendmentAuthority::Vote { result, .. } = authority {
        if result != ACCEPT_RESULT {
            return Err(PermissionError::VoteNotAccepted(result.clone()));
        }
    }

    // Gates come from the table in force before this request
    let permissions = entity.permissions().clone();
    let code = entity.permission_rejection();
    let mut amended = entity.clone();

    for (index, amendment) in amendments.iter().enumerate() {
        if amendment.field_index_path.is_empty() {
            return Err(PermissionError::EmptyPath { index });
        }

        let canonical = amended.apply_field(
            &amendment.field_index_path,
            amendment.operation,
            &amendment.data,
        )?;

        let permission = permissions
            .lookup(&canonical)
            .ok_or_else(|| PermissionError::NoPermission(canonical.clone()))?;

        check_gate(permission, &canonical, authority, code)?;
    }

    amended.validate()?;
    Ok(amended)
}

fn check_gate(
    permission: &Permission,
    path: &FieldIndexPath,
    authority: &AmendmentAuthority,
    code: RejectionCode,
) -> PermissionResult<()> {
    let denied = |reason: &str| PermissionError::NotPermitted {
        path: path.clone(),
        reason: reason.to_string(),
        code,
    };

    match authority {
        AmendmentAuthority::Direct => {
            if !permission.permitted {
                return Err(denied("not permitted without proposal"));
            }
        }
        AmendmentAuthority::Vote {
            proposal_type,
            voting_system,
            ..
        } => {
            let gate = match proposal_type {
                ProposalType::Administration => permission.administration_proposal,
                ProposalType::Holder => permission.holder_proposal,
                ProposalType::AdministrativeMatter => permission.administrative_matter,
            };
            if !gate {
                return Err(denied(&format!("not permitted by {} proposal", proposal_type)));
            }

            let allowed = permission
                .voting_systems_allowed
                .get(*voting_system as usize)
                .ok_or_else(|| PermissionError::VotingSystemOutOfRange {
                    path: path.clone(),
                    system: *voting_system,
                })?;
            if !allowed {
                return Err(denied(&format!("voting system {} not allowed", voting_system)));
            }
        }
    }
    Ok(())
}
