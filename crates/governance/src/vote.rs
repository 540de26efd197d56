//! Votes and ballots
//!
//! A vote is opened from an accepted proposal with a snapshot of every
//! eligible holder's voting quantity. Holders fill in their ballot until the
//! cutoff; the finalizer then tallies the ballots and records the result.

use crate::error::{GovernanceResult, VoteError};
use crate::tally::{tally, Tally};
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, AssetCode, Timestamp, TxId};
use smartledger_permissions::{AmendmentAuthority, AmendmentField, ProposalType, ACCEPT_RESULT};
use smartledger_protocol::Proposal;
use smartledger_state::VotingSystem;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What a vote's proposed amendments apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", content = "asset_code", rename_all = "snake_case")]
pub enum VoteTarget {
    Contract,
    Asset(AssetCode),
    Agreement,
}

impl VoteTarget {
    pub fn of(proposal: &Proposal) -> Self {
        match proposal.asset_code {
            Some(code) => VoteTarget::Asset(code),
            None if proposal.amends_agreement => VoteTarget::Agreement,
            None => VoteTarget::Contract,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// Voting quantity snapshotted when the vote opened
    pub quantity: u64,
    /// Chosen options in preference order, empty until cast
    #[serde(default)]
    pub vote: String,
    /// When the ballot was last cast
    #[serde(default)]
    pub timestamp: Timestamp,
}

impl Ballot {
    pub fn is_cast(&self) -> bool {
        !self.vote.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Transaction of the Vote action; identifies the vote
    pub vote_txid: TxId,
    pub proposal_txid: TxId,
    pub proposal_type: ProposalType,
    pub vote_system: u32,
    pub target: VoteTarget,
    pub vote_options: String,
    pub vote_max: u32,
    #[serde(default)]
    pub proposed_amendments: Vec<AmendmentField>,
    pub expires: Timestamp,
    /// Total eligible quantity at the snapshot
    pub token_qty: u64,
    pub ballots: BTreeMap<Address, Ballot>,
    #[serde(default)]
    pub option_tally: Vec<u64>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub completed_at: Timestamp,
    /// Result transaction emitted by the finalizer
    #[serde(default)]
    pub result_txid: Option<TxId>,
    /// Amendment transaction that applied this vote's amendments
    #[serde(default)]
    pub applied_txid: Option<TxId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Vote {
    /// Open a vote with the eligible quantities snapshotted from holdings
    pub fn open(
        vote_txid: TxId,
        proposal_txid: TxId,
        proposal: &Proposal,
        snapshot: BTreeMap<Address, u64>,
        now: Timestamp,
    ) -> Self {
        let token_qty = snapshot.values().fold(0u64, |sum, q| sum.saturating_add(*q));
        let ballots = snapshot
            .into_iter()
            .map(|(address, quantity)| {
                (
                    address,
                    Ballot {
                        quantity,
                        vote: String::new(),
                        timestamp: Timestamp::ZERO,
                    },
                )
            })
            .collect();

        Self {
            vote_txid,
            proposal_txid,
            proposal_type: proposal.proposal_type,
            vote_system: proposal.vote_system,
            target: VoteTarget::of(proposal),
            vote_options: proposal.vote_options.clone(),
            vote_max: proposal.vote_max,
            proposed_amendments: proposal.proposed_amendments.clone(),
            expires: proposal.vote_cutoff,
            token_qty,
            ballots,
            option_tally: Vec::new(),
            result: String::new(),
            completed_at: Timestamp::ZERO,
            result_txid: None,
            applied_txid: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.completed_at.is_zero()
    }

    /// Whether ballots are still accepted at `now`
    pub fn is_open(&self, now: Timestamp) -> bool {
        !self.is_complete() && now < self.expires
    }

    pub fn is_accepted(&self) -> bool {
        self.is_complete() && self.result == ACCEPT_RESULT
    }

    pub fn has_amendments(&self) -> bool {
        !self.proposed_amendments.is_empty()
    }

    /// Eligible quantity of an address, zero when it is not in the snapshot
    pub fn eligible_quantity(&self, address: &Address) -> u64 {
        self.ballots.get(address).map_or(0, |b| b.quantity)
    }

    /// Record a ballot, replacing any earlier one from the same address
    ///
    /// Returns the ballot's quantity.
    pub fn cast_ballot(&mut self, address: &Address, choice: &str, now: Timestamp) -> GovernanceResult<u64> {
        if !self.is_open(now) {
            return Err(VoteError::Closed(self.vote_txid));
        }
        self.check_choice(choice)?;

        let ballot = match self.ballots.get_mut(address) {
            Some(ballot) if ballot.quantity > 0 => ballot,
            _ => return Err(VoteError::NotEligible(*address)),
        };
        ballot.vote = choice.to_string();
        ballot.timestamp = now;
        let quantity = ballot.quantity;
        self.updated_at = now;
        Ok(quantity)
    }

    fn check_choice(&self, choice: &str) -> GovernanceResult<()> {
        if choice.is_empty() {
            return Err(VoteError::InvalidBallot("no options chosen".to_string()));
        }
        let count = choice.chars().count();
        if count > self.vote_max as usize {
            return Err(VoteError::InvalidBallot(format!(
                "{} options chosen, at most {} allowed",
                count, self.vote_max
            )));
        }
        for (i, c) in choice.chars().enumerate() {
            if !self.vote_options.contains(c) {
                return Err(VoteError::InvalidBallot(format!("invalid option {:?}", c)));
            }
            if choice.chars().take(i).any(|earlier| earlier == c) {
                return Err(VoteError::InvalidBallot(format!("option {:?} chosen twice", c)));
            }
        }
        Ok(())
    }

    /// Tally the ballots and close the vote
    pub fn complete(&mut self, system: &VotingSystem, now: Timestamp) -> GovernanceResult<Tally> {
        if self.is_complete() {
            return Err(VoteError::AlreadyComplete(self.vote_txid));
        }
        let outcome = tally(&self.ballots, &self.vote_options, self.vote_max, self.token_qty, system);
        self.option_tally = outcome.option_tally.clone();
        self.result = outcome.result.clone();
        self.completed_at = now;
        self.updated_at = now;

        info!(
            vote_txid = %self.vote_txid,
            result = %self.result,
            voted = outcome.voted_quantity,
            eligible = self.token_qty,
            "vote completed"
        );
        Ok(outcome)
    }

    /// Close the vote with an empty result
    ///
    /// Used when the vote's voting system no longer exists at the cutoff;
    /// the per-option tally still records every cast ballot in full.
    pub fn close_unresolved(&mut self, now: Timestamp) -> GovernanceResult<Tally> {
        if self.is_complete() {
            return Err(VoteError::AlreadyComplete(self.vote_txid));
        }
        let options: Vec<char> = self.vote_options.chars().collect();
        let mut option_tally = vec![0u64; options.len()];
        let mut voted_quantity: u64 = 0;
        for ballot in self.ballots.values().filter(|b| b.is_cast()) {
            voted_quantity = voted_quantity.saturating_add(ballot.quantity);
            for choice in ballot.vote.chars() {
                if let Some(position) = options.iter().position(|option| *option == choice) {
                    option_tally[position] = option_tally[position].saturating_add(ballot.quantity);
                }
            }
        }

        self.option_tally = option_tally.clone();
        self.result = String::new();
        self.completed_at = now;
        self.updated_at = now;
        warn!(vote_txid = %self.vote_txid, vote_system = self.vote_system, "vote closed without a voting system");
        Ok(Tally {
            option_tally,
            result: String::new(),
            voted_quantity,
        })
    }

    /// Authority for applying this vote's amendments
    pub fn authority(&self) -> AmendmentAuthority {
        AmendmentAuthority::Vote {
            proposal_type: self.proposal_type,
            voting_system: self.vote_system,
            result: self.result.clone(),
        }
    }

    /// Check that an amendment request matches this completed vote and
    /// return the authority it carries
    pub fn authorize(&self, target: VoteTarget, amendments: &[AmendmentField]) -> GovernanceResult<AmendmentAuthority> {
        if !self.is_complete() {
            return Err(VoteError::NotComplete(self.vote_txid));
        }
        if let Some(applied) = self.applied_txid {
            return Err(VoteError::AlreadyApplied(applied));
        }
        if self.target != target {
            return Err(VoteError::AmendmentMismatch {
                vote_txid: self.vote_txid,
                reason: "vote targets a different entity".to_string(),
            });
        }
        if !self.has_amendments() {
            return Err(VoteError::AmendmentMismatch {
                vote_txid: self.vote_txid,
                reason: "vote proposed no amendments".to_string(),
            });
        }
        if self.proposed_amendments != amendments {
            return Err(VoteError::AmendmentMismatch {
                vote_txid: self.vote_txid,
                reason: "amendments differ from the proposal".to_string(),
            });
        }
        Ok(self.authority())
    }

    /// Record the amendment transaction that applied this vote
    pub fn mark_applied(&mut self, txid: TxId, now: Timestamp) -> GovernanceResult<()> {
        if let Some(applied) = self.applied_txid {
            return Err(VoteError::AlreadyApplied(applied));
        }
        self.applied_txid = Some(txid);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use smartledger_permissions::AmendmentField;
    use smartledger_state::VoteType;

    fn proposal(amendments: Vec<AmendmentField>) -> Proposal {
        Proposal {
            proposal_type: ProposalType::Holder,
            asset_code: None,
            amends_agreement: false,
            vote_system: 0,
            proposed_amendments: amendments,
            vote_options: "AB".to_string(),
            vote_max: 1,
            vote_cutoff: Timestamp::from_secs(100),
            description: String::new(),
        }
    }

    fn open_vote(amendments: Vec<AmendmentField>) -> Vote {
        let snapshot = BTreeMap::from([(Address::new([1; 20]), 600), (Address::new([2; 20]), 400)]);
        Vote::open(
            TxId::new([9; 32]),
            TxId::new([8; 32]),
            &proposal(amendments),
            snapshot,
            Timestamp::from_secs(10),
        )
    }

    #[test]
    fn test_open_snapshots_eligible_quantity() {
        let vote = open_vote(vec![]);
        assert_eq!(vote.token_qty, 1000);
        assert_eq!(vote.eligible_quantity(&Address::new([1; 20])), 600);
        assert_eq!(vote.eligible_quantity(&Address::new([3; 20])), 0);
        assert!(vote.is_open(Timestamp::from_secs(99)));
        assert!(!vote.is_open(Timestamp::from_secs(100)));
    }

    #[test]
    fn test_later_ballot_overwrites() {
        let mut vote = open_vote(vec![]);
        let voter = Address::new([1; 20]);
        assert_eq!(vote.cast_ballot(&voter, "B", Timestamp::from_secs(20)).unwrap(), 600);
        vote.cast_ballot(&voter, "A", Timestamp::from_secs(30)).unwrap();

        let ballot = &vote.ballots[&voter];
        assert_eq!(ballot.vote, "A");
        assert_eq!(ballot.timestamp, Timestamp::from_secs(30));
        assert_eq!(vote.ballots.values().filter(|b| b.is_cast()).count(), 1);
    }

    #[test]
    fn test_ballot_rejections() {
        let mut vote = open_vote(vec![]);
        let voter = Address::new([1; 20]);
        let now = Timestamp::from_secs(20);

        let err = vote.cast_ballot(&Address::new([3; 20]), "A", now).unwrap_err();
        assert_eq!(err.rejection_code(), smartledger_core::RejectionCode::UnauthorizedAddress);
        assert!(matches!(vote.cast_ballot(&voter, "", now), Err(VoteError::InvalidBallot(_))));
        assert!(matches!(vote.cast_ballot(&voter, "AB", now), Err(VoteError::InvalidBallot(_))));
        assert!(matches!(vote.cast_ballot(&voter, "C", now), Err(VoteError::InvalidBallot(_))));

        let err = vote.cast_ballot(&voter, "A", Timestamp::from_secs(100)).unwrap_err();
        assert_eq!(err.rejection_code(), smartledger_core::RejectionCode::VoteClosed);
    }

    #[test]
    fn test_complete_then_authorize_once() {
        let amendment = AmendmentField::modify(vec![1u32], &"Renamed").unwrap();
        let mut vote = open_vote(vec![amendment.clone()]);
        vote.cast_ballot(&Address::new([1; 20]), "A", Timestamp::from_secs(20)).unwrap();

        let system = VotingSystem::new("Relative", VoteType::Relative, dec!(50));
        let outcome = vote.complete(&system, Timestamp::from_secs(100)).unwrap();
        assert_eq!(outcome.result, "A");
        assert!(vote.is_accepted());
        assert!(matches!(
            vote.complete(&system, Timestamp::from_secs(101)),
            Err(VoteError::AlreadyComplete(_))
        ));

        assert!(matches!(
            vote.authorize(VoteTarget::Agreement, &[amendment.clone()]),
            Err(VoteError::AmendmentMismatch { .. })
        ));
        assert!(matches!(
            vote.authorize(VoteTarget::Contract, &[]),
            Err(VoteError::AmendmentMismatch { .. })
        ));
        assert!(matches!(
            vote.authorize(VoteTarget::Contract, &[amendment.clone()]).unwrap(),
            AmendmentAuthority::Vote { ref result, .. } if result == "A"
        ));

        vote.mark_applied(TxId::new([7; 32]), Timestamp::from_secs(110)).unwrap();
        assert!(matches!(
            vote.authorize(VoteTarget::Contract, &[amendment]),
            Err(VoteError::AlreadyApplied(_))
        ));
    }

    #[test]
    fn test_close_unresolved_keeps_tally_without_result() {
        let amendment = AmendmentField::modify(vec![1u32], &"Renamed").unwrap();
        let mut vote = open_vote(vec![amendment.clone()]);
        vote.cast_ballot(&Address::new([1; 20]), "A", Timestamp::from_secs(20)).unwrap();
        vote.cast_ballot(&Address::new([2; 20]), "B", Timestamp::from_secs(21)).unwrap();

        let outcome = vote.close_unresolved(Timestamp::from_secs(100)).unwrap();
        assert_eq!(outcome.option_tally, vec![600, 400]);
        assert_eq!(outcome.voted_quantity, 1000);
        assert!(outcome.result.is_empty());
        assert!(vote.is_complete());
        assert!(!vote.is_accepted());
        assert!(matches!(
            vote.close_unresolved(Timestamp::from_secs(101)),
            Err(VoteError::AlreadyComplete(_))
        ));
    }
}
