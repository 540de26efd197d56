//! Contract offer and amendment

use crate::actor::{ContractActor, Handled, Reply};
use crate::error::{NodeError, NodeResult};
use smartledger_core::{RejectionCode, Timestamp};
use smartledger_governance::VoteTarget;
use smartledger_permissions::apply_amendments;
use smartledger_protocol::{Action, ContractAmendment, ContractFormation, ContractOffer, Transaction};
use smartledger_state::Contract;
use tracing::info;

impl ContractActor {
    pub(crate) async fn contract_offer(
        &mut self,
        tx: &Transaction,
        offer: &ContractOffer,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        if self.state.fetch_contract(&self.address).await?.is_some() {
            return Err(NodeError::rejected(RejectionCode::ContractExists, "contract already formed"));
        }
        let requester = self.requester(tx)?;
        let terms = &offer.terms;
        if requester != terms.admin_address && terms.operator_address != Some(requester) {
            return Err(NodeError::rejected(
                RejectionCode::UnauthorizedAddress,
                format!("{} is neither the proposed administration nor operator", requester),
            ));
        }
        terms.validate()?;

        let contract = Contract::new(self.address, terms.clone(), now);
        let action = Action::ContractFormation(ContractFormation {
            contract: contract.clone(),
            timestamp: now,
        });
        let response = match self.respond(tx, Vec::new(), action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.state.save_contract(&contract).await?;
        self.refresh_policy(&contract);
        info!(contract = %self.address, name = %contract.terms.name, "contract formed");
        Ok(Handled::responded(&response))
    }

    pub(crate) async fn contract_amendment(
        &mut self,
        tx: &Transaction,
        amendment: &ContractAmendment,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        let mut contract = self.load_contract().await?;
        if let Some(moved_to) = contract.moved_to {
            return Err(NodeError::rejected(
                RejectionCode::ContractMoved,
                format!("contract moved to {}", moved_to),
            ));
        }
        if contract.is_expired(now) {
            return Err(NodeError::rejected(RejectionCode::ContractExpired, "contract expired"));
        }
        let requester = self.requester(tx)?;
        self.require_operator(&contract, &requester)?;

        let (authority, vote) = self
            .amendment_authority(amendment.ref_txid, VoteTarget::Contract, &amendment.amendments)
            .await?;
        let asset_count = contract.asset_codes.len() as u64;
        apply_amendments(&mut contract, amendment.contract_revision, &amendment.amendments, &authority)?;

        let restricted = contract.terms.restricted_qty_assets;
        if restricted != 0 && restricted < asset_count {
            return Err(NodeError::rejected(
                RejectionCode::ContractAssetQtyReduction,
                format!("asset limit {} is below the {} assets defined", restricted, asset_count),
            ));
        }
        contract.updated_at = now;

        let action = Action::ContractFormation(ContractFormation {
            contract: contract.clone(),
            timestamp: now,
        });
        let response = match self.respond(tx, Vec::new(), action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.state.save_contract(&contract).await?;
        self.mark_vote_applied(vote, tx.txid, now).await?;
        self.refresh_policy(&contract);
        info!(
            contract = %self.address,
            revision = contract.revision,
            fields = amendment.amendments.len(),
            "contract amended"
        );
        Ok(Handled::responded(&response))
    }
}
