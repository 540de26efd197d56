//! Proposals, ballots and vote results
//!
//! The Vote response passes everything beyond its own fees back to the
//! contract, so the Result sent at the cutoff is funded by the proposal.

use crate::actor::{ContractActor, Handled, Reply};
use crate::error::NodeResult;
use smartledger_core::{RejectionCode, Timestamp, TxId};
use smartledger_governance::{
    check_conflicts, snapshot_ballots, validate_proposal, ProposalScope, Vote, VoteError, VoteTarget,
};
use smartledger_protocol::{
    Action, BallotCast, BallotCounted, Job, JobKind, Proposal, ProtocolError, Transaction, TxOutput, VoteOpened,
    VoteResult,
};
use tracing::{info, warn};

impl ContractActor {
    pub(crate) async fn proposal(
        &mut self,
        tx: &Transaction,
        proposal: &Proposal,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        let contract = self.load_contract().await?;
        self.check_active(&contract, now)?;
        let requester = self.requester(tx)?;

        let asset = match proposal.asset_code {
            Some(code) => Some(
                self.state
                    .fetch_asset(&contract, &code)
                    .await?
                    .ok_or(VoteError::AssetNotFound(code))?,
            ),
            None => None,
        };
        let agreement = self.state.fetch_agreement(&self.address).await?;
        let snapshot = snapshot_ballots(&self.holdings, &self.state, &contract, proposal).await?;
        let initiator_quantity = snapshot.get(&requester).copied().unwrap_or(0);

        let scope = ProposalScope {
            contract: &contract,
            asset: asset.as_ref(),
            agreement: agreement.as_ref(),
        };
        validate_proposal(&scope, proposal, &requester, initiator_quantity, now)?;
        let votes = self.votes.list(&self.address).await?;
        check_conflicts(proposal, &votes)?;

        // The Vote response and the later Result each pay a response fee
        let policy = self.writer.policy();
        let fee = policy.contract_fee_output().map_or(0, |o| o.value);
        let available = tx.value_to(&self.address);
        let required = 2 * policy.response_fee + fee + policy.dust_limit;
        if available < required {
            return Err(ProtocolError::InsufficientFunding { required, available }.into());
        }
        let carried = available - policy.response_fee - fee;

        let action = Action::Vote(VoteOpened { timestamp: now });
        let outputs = vec![TxOutput::new(self.address, carried)];
        let response = match self.respond(tx, outputs, action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        let vote = Vote::open(response.txid, tx.txid, proposal, snapshot, now);
        self.votes.save(&self.address, &vote).await?;
        self.scheduler
            .schedule(Job::new(
                self.address,
                proposal.vote_cutoff,
                JobKind::VoteFinalizer {
                    vote_txid: vote.vote_txid,
                },
            ))
            .await?;

        info!(
            contract = %self.address,
            vote = %vote.vote_txid,
            proposal_type = %proposal.proposal_type,
            eligible = vote.token_qty,
            cutoff = %proposal.vote_cutoff,
            "vote opened"
        );
        Ok(Handled::responded(&response))
    }

    pub(crate) async fn ballot_cast(
        &mut self,
        tx: &Transaction,
        ballot: &BallotCast,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        self.load_contract().await?;
        let requester = self.requester(tx)?;
        let mut vote = self
            .votes
            .fetch(&self.address, &ballot.vote_txid)
            .await?
            .ok_or(VoteError::NotFound(ballot.vote_txid))?;
        let quantity = vote.cast_ballot(&requester, &ballot.vote, now)?;

        let action = Action::BallotCounted(BallotCounted {
            vote_txid: ballot.vote_txid,
            vote: ballot.vote.clone(),
            quantity,
            timestamp: now,
        });
        let response = match self.respond(tx, Vec::new(), action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.votes.save(&self.address, &vote).await?;
        info!(vote = %ballot.vote_txid, voter = %requester, quantity, "ballot counted");
        Ok(Handled::responded(&response))
    }

    /// Tally a vote at its cutoff and publish the result
    ///
    /// The tally is kept even when the Result cannot be funded.
    pub async fn finalize_vote(&mut self, vote_txid: &TxId, now: Timestamp) -> NodeResult<Handled> {
        let contract = self.load_contract().await?;
        let Some(mut vote) = self.votes.fetch(&self.address, vote_txid).await? else {
            warn!(vote = %vote_txid, "finalizer for unknown vote");
            return Ok(Handled::Ignored);
        };
        if vote.is_complete() {
            return Ok(Handled::Ignored);
        }
        let tally = match contract.voting_system(vote.vote_system) {
            Some(system) => vote.complete(system, now)?,
            None => vote.close_unresolved(now)?,
        };

        let action = Action::Result(VoteResult {
            vote_txid: *vote_txid,
            asset_code: match vote.target {
                VoteTarget::Asset(code) => Some(code),
                _ => None,
            },
            proposed_amendments: vote.proposed_amendments.clone(),
            option_tally: tally.option_tally,
            result: tally.result,
            timestamp: now,
        });
        let funding = match self.transactions.fetch(&self.address, vote_txid).await? {
            Some(vote_tx) => self.writer.funding_inputs(&vote_tx),
            None => Vec::new(),
        };

        let handled = match self.writer.build(funding, Vec::new(), action) {
            Ok(result) => {
                let result = self.send(result).await?;
                vote.result_txid = Some(result.txid);
                Handled::responded(&result)
            }
            Err(ProtocolError::InsufficientFunding { required, available }) => {
                warn!(vote = %vote_txid, required, available, "vote result unfunded");
                Handled::Silent {
                    code: RejectionCode::InsufficientTxFeeFunding,
                }
            }
            Err(e) => return Err(e.into()),
        };
        self.votes.save(&self.address, &vote).await?;
        Ok(handled)
    }
}
