//! Asset definition and modification
//!
//! The administration holds the whole authorized quantity of a new asset.
//! Raising the authorized quantity credits the difference to the
//! administration; lowering it takes the difference back, and is rejected
//! when the administration no longer holds that much.

use crate::actor::{ContractActor, Handled, Reply};
use crate::error::{NodeError, NodeResult};
use smartledger_core::{RejectionCode, Timestamp};
use smartledger_governance::VoteTarget;
use smartledger_holdings::HoldingsError;
use smartledger_permissions::apply_amendments;
use smartledger_protocol::{Action, AssetCreation, AssetDefinition, AssetModification, Transaction};
use smartledger_state::{Asset, ContractType, MEMBERSHIP_TYPE};
use std::cmp::Ordering;
use tracing::info;

impl ContractActor {
    pub(crate) async fn asset_definition(
        &mut self,
        tx: &Transaction,
        definition: &AssetDefinition,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        let mut contract = self.load_contract().await?;
        self.check_active(&contract, now)?;
        let requester = self.requester(tx)?;
        self.require_operator(&contract, &requester)?;

        let terms = &definition.terms;
        if !contract.can_have_more_assets() {
            return Err(NodeError::rejected(
                RejectionCode::MsgMalformed,
                format!("contract is limited to {} assets", contract.terms.restricted_qty_assets),
            ));
        }
        terms.validate(contract.terms.voting_systems.len())?;
        if contract.terms.contract_type == ContractType::Entity && terms.asset_type != MEMBERSHIP_TYPE {
            return Err(NodeError::rejected(
                RejectionCode::ContractTypeNotPermitted,
                format!("entity contracts hold membership assets only, not {}", terms.asset_type),
            ));
        }
        let admin_membership = terms.is_admin_membership();
        if admin_membership && contract.admin_member_asset.is_some() {
            return Err(NodeError::rejected(
                RejectionCode::MsgMalformed,
                "administration membership asset already defined",
            ));
        }

        let index = contract.asset_codes.len() as u64;
        let asset = Asset::new(self.address, index, terms.clone(), now)
            .with_voting_systems(contract.terms.voting_systems.len());
        let action = Action::AssetCreation(AssetCreation {
            asset: asset.clone(),
            timestamp: now,
        });
        let response = match self.respond(tx, Vec::new(), action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.state.save_asset(&asset).await?;
        contract.add_asset_code(asset.code);
        if admin_membership {
            contract.admin_member_asset = Some(asset.code);
        }
        contract.updated_at = now;
        self.state.save_contract(&contract).await?;

        let admin = contract.admin_address();
        let mut holding = self.holdings.get(&self.address, &asset.code, &admin, now).await?;
        holding.credit_finalized(terms.authorized_token_qty, now);
        self.holdings.save(&self.address, &asset.code, &holding).await?;

        info!(
            contract = %self.address,
            asset = %asset.code,
            index,
            quantity = terms.authorized_token_qty,
            "asset created"
        );
        Ok(Handled::responded(&response))
    }

    pub(crate) async fn asset_modification(
        &mut self,
        tx: &Transaction,
        modification: &AssetModification,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        let contract = self.load_contract().await?;
        self.check_active(&contract, now)?;
        let requester = self.requester(tx)?;
        self.require_operator(&contract, &requester)?;

        let code = modification.asset_code;
        let mut asset = self
            .state
            .fetch_asset(&contract, &code)
            .await?
            .ok_or_else(|| NodeError::rejected(RejectionCode::AssetNotFound, format!("asset {} not found", code)))?;
        let (authority, vote) = self
            .amendment_authority(modification.ref_txid, VoteTarget::Asset(code), &modification.amendments)
            .await?;

        let before = asset.terms.authorized_token_qty;
        apply_amendments(&mut asset, modification.asset_revision, &modification.amendments, &authority)?;
        asset.updated_at = now;
        let after = asset.terms.authorized_token_qty;

        let admin = contract.admin_address();
        let mut holding = self.holdings.get(&self.address, &code, &admin, now).await?;
        match after.cmp(&before) {
            Ordering::Greater => holding.credit_finalized(after - before, now),
            Ordering::Less => {
                let reduction = before - after;
                let available = holding.safe_balance().min(holding.unfrozen_balance(now));
                if available < reduction {
                    return Err(HoldingsError::InsufficientHoldings {
                        available,
                        requested: reduction,
                    }
                    .into());
                }
                holding.take_finalized(reduction, now);
            }
            Ordering::Equal => {}
        }

        let action = Action::AssetCreation(AssetCreation {
            asset: asset.clone(),
            timestamp: now,
        });
        let response = match self.respond(tx, Vec::new(), action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.state.save_asset(&asset).await?;
        if after != before {
            self.holdings.save(&self.address, &code, &holding).await?;
        }
        self.mark_vote_applied(vote, tx.txid, now).await?;
        info!(
            contract = %self.address,
            asset = %code,
            revision = asset.revision,
            authorized = after,
            "asset modified"
        );
        Ok(Handled::responded(&response))
    }
}
