//! Proposal validation and ballot snapshots
//!
//! A proposal becomes a vote only after these checks pass, in order:
//!
//! 1. initiator: operator for administration and administrative matters,
//!    a voting holder for holder proposals
//! 2. voting system exists and permits the kind of proposal
//! 3. options, maximum choices and cutoff are well formed
//! 4. the contract or asset allows proposals of this type
//! 5. proposed amendments would apply if the vote accepts them
//! 6. no unapplied vote already proposes a change to the same field

use crate::error::{GovernanceResult, VoteError};
use crate::vote::{Vote, VoteTarget};
use smartledger_core::{Address, RejectionCode, Timestamp};
use smartledger_holdings::HoldingsCache;
use smartledger_permissions::{preview_amendments, ProposalType};
use smartledger_protocol::Proposal;
use smartledger_state::{Agreement, Asset, Contract, StateRepository, VoteType};
use std::collections::BTreeMap;
use tracing::debug;

/// Options a proposal with specific amendments must offer
pub const AMENDMENT_OPTIONS: &str = "AB";

/// Entities a proposal is checked against
pub struct ProposalScope<'a> {
    pub contract: &'a Contract,
    /// Present when the proposal names an asset
    pub asset: Option<&'a Asset>,
    /// Present when the contract has formed an agreement
    pub agreement: Option<&'a Agreement>,
}

/// Validate a proposal request
///
/// `initiator_quantity` is the initiator's eligible voting quantity in the
/// snapshot taken for this proposal.
pub fn validate_proposal(
    scope: &ProposalScope<'_>,
    proposal: &Proposal,
    initiator: &Address,
    initiator_quantity: u64,
    now: Timestamp,
) -> GovernanceResult<()> {
    let contract = scope.contract;

    match proposal.proposal_type {
        ProposalType::Administration | ProposalType::AdministrativeMatter => {
            if !contract.is_operator(initiator) {
                return Err(VoteError::NotOperator(*initiator));
            }
        }
        ProposalType::Holder => {
            if initiator_quantity == 0 {
                return Err(VoteError::NotHolder(*initiator));
            }
        }
    }

    let system = contract.voting_system(proposal.vote_system).ok_or_else(|| {
        VoteError::InvalidProposal(format!("voting system {} does not exist", proposal.vote_system))
    })?;
    let has_amendments = !proposal.proposed_amendments.is_empty();
    if has_amendments && system.vote_type == VoteType::Plurality {
        return Err(VoteError::VoteSystemNotPermitted(format!(
            "plurality system {:?} cannot decide specific amendments",
            system.name
        )));
    }

    check_options(proposal, now)?;
    if has_amendments && (proposal.vote_options != AMENDMENT_OPTIONS || proposal.vote_max != 1) {
        return Err(VoteError::InvalidProposal(format!(
            "specific amendments require options {:?} with one choice",
            AMENDMENT_OPTIONS
        )));
    }

    match VoteTarget::of(proposal) {
        VoteTarget::Asset(code) => {
            let asset = scope.asset.ok_or(VoteError::AssetNotFound(code))?;
            if asset.is_frozen(now) {
                return Err(VoteError::AssetFrozen(code));
            }
            check_allowed(
                proposal.proposal_type,
                asset.terms.administration_proposal,
                asset.terms.holder_proposal,
                RejectionCode::AssetPermissions,
            )?;
            if has_amendments {
                preview_amendments(asset, &proposal.proposed_amendments, proposal.proposal_type, proposal.vote_system)?;
            }
        }
        target => {
            if contract.terms.voting_systems.is_empty() {
                return Err(VoteError::ProposalsNotPermitted {
                    reason: "contract has no voting systems".to_string(),
                    code: RejectionCode::ContractPermissions,
                });
            }
            check_allowed(
                proposal.proposal_type,
                contract.terms.administration_proposal,
                contract.terms.holder_proposal,
                RejectionCode::ContractPermissions,
            )?;
            if has_amendments {
                if target == VoteTarget::Agreement {
                    let agreement = scope.agreement.ok_or_else(|| {
                        VoteError::InvalidProposal("contract has no agreement".to_string())
                    })?;
                    preview_amendments(
                        agreement,
                        &proposal.proposed_amendments,
                        proposal.proposal_type,
                        proposal.vote_system,
                    )?;
                } else {
                    preview_amendments(
                        contract,
                        &proposal.proposed_amendments,
                        proposal.proposal_type,
                        proposal.vote_system,
                    )?;
                }
            }
        }
    }

    Ok(())
}

fn check_options(proposal: &Proposal, now: Timestamp) -> GovernanceResult<()> {
    let options: Vec<char> = proposal.vote_options.chars().collect();
    if options.is_empty() {
        return Err(VoteError::InvalidProposal("no vote options".to_string()));
    }
    for (i, option) in options.iter().enumerate() {
        if options[..i].contains(option) {
            return Err(VoteError::InvalidProposal(format!("duplicate vote option {:?}", option)));
        }
    }
    if proposal.vote_max == 0 || proposal.vote_max as usize > options.len() {
        return Err(VoteError::InvalidProposal(format!(
            "vote max {} out of range for {} options",
            proposal.vote_max,
            options.len()
        )));
    }
    if proposal.vote_cutoff <= now {
        return Err(VoteError::InvalidProposal(format!(
            "vote cutoff {} is not in the future",
            proposal.vote_cutoff
        )));
    }
    Ok(())
}

fn check_allowed(
    proposal_type: ProposalType,
    administration_proposal: bool,
    holder_proposal: bool,
    code: RejectionCode,
) -> GovernanceResult<()> {
    let allowed = match proposal_type {
        ProposalType::Administration => administration_proposal,
        ProposalType::Holder => holder_proposal,
        ProposalType::AdministrativeMatter => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(VoteError::ProposalsNotPermitted {
            reason: format!("{} proposals not allowed", proposal_type),
            code,
        })
    }
}

/// Reject proposals amending a field that an unapplied vote already targets
///
/// Completed votes that did not accept their amendments can never be
/// applied and are ignored.
pub fn check_conflicts(proposal: &Proposal, votes: &[Vote]) -> GovernanceResult<()> {
    if proposal.proposed_amendments.is_empty() {
        return Ok(());
    }
    let target = VoteTarget::of(proposal);

    for vote in votes {
        if vote.applied_txid.is_some() || !vote.has_amendments() || vote.target != target {
            continue;
        }
        if vote.is_complete() && !vote.is_accepted() {
            continue;
        }
        for field in &proposal.proposed_amendments {
            let clash = vote
                .proposed_amendments
                .iter()
                .any(|other| other.field_index_path == field.field_index_path);
            if clash {
                return Err(VoteError::Conflict {
                    vote_txid: vote.vote_txid,
                    path: field.field_index_path.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Eligible voting quantity per holder for a proposal
///
/// Administrative matters count only the administration's membership asset,
/// asset-scoped proposals count that asset, and everything else counts every
/// asset except the administration's membership asset.
pub async fn snapshot_ballots(
    holdings: &HoldingsCache,
    state: &StateRepository,
    contract: &Contract,
    proposal: &Proposal,
) -> GovernanceResult<BTreeMap<Address, u64>> {
    let system = contract.voting_system(proposal.vote_system).ok_or_else(|| {
        VoteError::InvalidProposal(format!("voting system {} does not exist", proposal.vote_system))
    })?;
    let apply_multiplier = system.vote_multiplier_permitted;
    let mut ballots = BTreeMap::new();

    let scoped = match (proposal.proposal_type, proposal.asset_code) {
        (ProposalType::AdministrativeMatter, _) => {
            let code = contract.admin_member_asset.ok_or_else(|| {
                VoteError::InvalidProposal("administration membership asset not defined".to_string())
            })?;
            Some(code)
        }
        (_, Some(code)) => Some(code),
        (_, None) => None,
    };

    match scoped {
        Some(code) => {
            let asset = state
                .fetch_asset(contract, &code)
                .await?
                .ok_or(VoteError::AssetNotFound(code))?;
            holdings
                .append_ballots(&contract.address, &asset, &mut ballots, apply_multiplier)
                .await?;
        }
        None => {
            for asset in state.list_assets(contract).await? {
                if Some(asset.code) == contract.admin_member_asset {
                    continue;
                }
                holdings
                    .append_ballots(&contract.address, &asset, &mut ballots, apply_multiplier)
                    .await?;
            }
        }
    }

    debug!(
        contract = %contract.address,
        holders = ballots.len(),
        "ballots snapshotted"
    );
    Ok(ballots)
}
