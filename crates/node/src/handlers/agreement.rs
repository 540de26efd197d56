//! Agreement offer and amendment

use crate::actor::{ContractActor, Handled, Reply};
use crate::error::{NodeError, NodeResult};
use smartledger_core::{RejectionCode, Timestamp};
use smartledger_governance::VoteTarget;
use smartledger_permissions::apply_amendments;
use smartledger_protocol::{Action, AgreementAmendment, AgreementFormation, AgreementOffer, Transaction};
use smartledger_state::Agreement;
use tracing::info;

impl ContractActor {
    pub(crate) async fn agreement_offer(
        &mut self,
        tx: &Transaction,
        offer: &AgreementOffer,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        let contract = self.load_contract().await?;
        self.check_active(&contract, now)?;
        let requester = self.requester(tx)?;
        self.require_operator(&contract, &requester)?;

        if self.state.fetch_agreement(&self.address).await?.is_some() {
            return Err(NodeError::rejected(RejectionCode::AgreementExists, "agreement already formed"));
        }
        offer.terms.validate()?;
        offer.terms.permissions.validate(contract.terms.voting_systems.len())?;

        let agreement = Agreement::new(self.address, offer.terms.clone(), now);
        let action = Action::AgreementFormation(AgreementFormation {
            agreement: agreement.clone(),
            timestamp: now,
        });
        let response = match self.respond(tx, Vec::new(), action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.state.save_agreement(&agreement).await?;
        info!(
            contract = %self.address,
            chapters = agreement.terms.chapters.len(),
            "agreement formed"
        );
        Ok(Handled::responded(&response))
    }

    pub(crate) async fn agreement_amendment(
        &mut self,
        tx: &Transaction,
        amendment: &AgreementAmendment,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        let contract = self.load_contract().await?;
        self.check_active(&contract, now)?;
        let requester = self.requester(tx)?;
        self.require_operator(&contract, &requester)?;

        let mut agreement = self
            .state
            .fetch_agreement(&self.address)
            .await?
            .ok_or_else(|| NodeError::rejected(RejectionCode::AgreementDoesNotExist, "agreement not formed"))?;
        let (authority, vote) = self
            .amendment_authority(amendment.ref_txid, VoteTarget::Agreement, &amendment.amendments)
            .await?;
        apply_amendments(&mut agreement, amendment.agreement_revision, &amendment.amendments, &authority)?;
        agreement.updated_at = now;

        let action = Action::AgreementFormation(AgreementFormation {
            agreement: agreement.clone(),
            timestamp: now,
        });
        let response = match self.respond(tx, Vec::new(), action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.state.save_agreement(&agreement).await?;
        self.mark_vote_applied(vote, tx.txid, now).await?;
        info!(contract = %self.address, revision = agreement.revision, "agreement amended");
        Ok(Handled::responded(&response))
    }
}
