//! Order validation and commitment
//!
//! ```text
//! Order ──► plan() ──► (caller builds and sends the response) ──► commit(response txid)
//!            │                                                      │
//!            └─ operator, authority, asset, targets, balances       └─ holdings / freeze state
//! ```
//!
//! Nothing is written until `commit`, so a response that cannot be funded
//! leaves the ledger untouched.

use crate::authority::verify_authority;
use crate::error::{EnforcementError, EnforcementResult};
use crate::plan::{ConfiscationPlan, EnforcementPlan, FreezePlan, ReconciliationPlan, ThawPlan};
use crate::repository::{FreezeRecord, FreezeRepository, FreezeScope};
use smartledger_core::{Address, AssetCode, Timestamp, TxId};
use smartledger_holdings::{Holding, HoldingsCache, HoldingsError};
use smartledger_protocol::{ComplianceAction, Order, TargetAddress};
use smartledger_state::{Asset, Contract, StateRepository};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Entity freeze expiry used for indefinite whole-asset and whole-contract freezes
const INDEFINITE: Timestamp = Timestamp::from_nanos(u64::MAX);

pub struct EnforcementEngine {
    holdings: Arc<HoldingsCache>,
    state: StateRepository,
    freezes: FreezeRepository,
}

impl EnforcementEngine {
    pub fn new(holdings: Arc<HoldingsCache>, state: StateRepository, freezes: FreezeRepository) -> Self {
        Self {
            holdings,
            state,
            freezes,
        }
    }

    /// Validate an order and compute its effects without writing them
    pub async fn plan(
        &self,
        contract: &Contract,
        order: &Order,
        requester: &Address,
        now: Timestamp,
    ) -> EnforcementResult<EnforcementPlan> {
        if contract.is_expired(now) {
            return Err(EnforcementError::ContractExpired);
        }
        if !contract.is_operator(requester) {
            return Err(EnforcementError::NotOperator(*requester));
        }
        verify_authority(contract, order)?;

        let asset = match order.asset_code {
            Some(code) => {
                let asset = self
                    .state
                    .fetch_asset(contract, &code)
                    .await?
                    .ok_or(EnforcementError::AssetNotFound(code))?;
                if !asset.terms.enforcement_orders_permitted {
                    return Err(EnforcementError::NotPermitted(code));
                }
                Some(asset)
            }
            None => None,
        };

        let plan = match order.compliance_action {
            ComplianceAction::Freeze => EnforcementPlan::Freeze(plan_freeze(contract, asset.as_ref(), order, now)?),
            ComplianceAction::Thaw => EnforcementPlan::Thaw(self.plan_thaw(contract, order).await?),
            ComplianceAction::Confiscation => {
                let asset = require_asset(asset.as_ref(), order)?;
                EnforcementPlan::Confiscation(self.plan_confiscation(contract, asset, order, now).await?)
            }
            ComplianceAction::Reconciliation => {
                let asset = require_asset(asset.as_ref(), order)?;
                EnforcementPlan::Reconciliation(self.plan_reconciliation(contract, asset, order, now).await?)
            }
        };
        Ok(plan)
    }

    async fn plan_thaw(&self, contract: &Contract, order: &Order) -> EnforcementResult<ThawPlan> {
        let freeze_txid = order
            .freeze_txid
            .ok_or_else(|| EnforcementError::Malformed("thaw without freeze txid".to_string()))?;
        let record = self
            .freezes
            .fetch(&contract.address, &freeze_txid)
            .await?
            .ok_or(EnforcementError::FreezeNotFound(freeze_txid))?;
        if record.asset_code != order.asset_code {
            return Err(EnforcementError::Malformed(format!(
                "freeze {} is for a different asset",
                freeze_txid
            )));
        }
        Ok(ThawPlan { record })
    }

    async fn plan_confiscation(
        &self,
        contract: &Contract,
        asset: &Asset,
        order: &Order,
        now: Timestamp,
    ) -> EnforcementResult<ConfiscationPlan> {
        let deposit_address = order
            .deposit_address
            .ok_or_else(|| EnforcementError::Malformed("confiscation without deposit address".to_string()))?;
        check_targets(&order.target_addresses)?;
        if order.target_addresses.iter().any(|t| t.address == deposit_address) {
            return Err(EnforcementError::Malformed("deposit address is also a target".to_string()));
        }

        let (targets, total) = self.take_from_targets(contract, asset, &order.target_addresses, now).await?;
        let mut deposit = self
            .holdings
            .get(&contract.address, &asset.code, &deposit_address, now)
            .await?;
        deposit.credit_finalized(total, now);

        Ok(ConfiscationPlan {
            asset_code: asset.code,
            targets,
            deposit,
        })
    }

    async fn plan_reconciliation(
        &self,
        contract: &Contract,
        asset: &Asset,
        order: &Order,
        now: Timestamp,
    ) -> EnforcementResult<ReconciliationPlan> {
        check_targets(&order.target_addresses)?;

        let mut dispersions = vec![0u64; order.target_addresses.len()];
        for dispersion in &order.bitcoin_dispersions {
            let slot = dispersions.get_mut(dispersion.index as usize).ok_or_else(|| {
                EnforcementError::Malformed(format!("bitcoin dispersion index {} out of range", dispersion.index))
            })?;
            *slot = slot.saturating_add(dispersion.quantity);
        }

        let (targets, _) = self.take_from_targets(contract, asset, &order.target_addresses, now).await?;
        Ok(ReconciliationPlan {
            asset_code: asset.code,
            targets,
            dispersions,
        })
    }

    async fn take_from_targets(
        &self,
        contract: &Contract,
        asset: &Asset,
        targets: &[TargetAddress],
        now: Timestamp,
    ) -> EnforcementResult<(Vec<Holding>, u64)> {
        let mut holdings = Vec::with_capacity(targets.len());
        let mut total: u64 = 0;
        for target in targets {
            let mut holding = self
                .holdings
                .get(&contract.address, &asset.code, &target.address, now)
                .await?;
            if holding.finalized_balance < target.quantity {
                return Err(HoldingsError::InsufficientHoldings {
                    available: holding.finalized_balance,
                    requested: target.quantity,
                }
                .into());
            }
            total = total.saturating_add(holding.take_finalized(target.quantity, now));
            holdings.push(holding);
        }
        Ok((holdings, total))
    }

    /// Write a plan's effects once its response `response_txid` is sent
    pub async fn commit(
        &self,
        contract: &mut Contract,
        plan: &EnforcementPlan,
        response_txid: TxId,
        now: Timestamp,
    ) -> EnforcementResult<()> {
        match plan {
            EnforcementPlan::Freeze(freeze) => self.commit_freeze(contract, freeze, response_txid, now).await?,
            EnforcementPlan::Thaw(thaw) => self.commit_thaw(contract, &thaw.record, now).await?,
            EnforcementPlan::Confiscation(confiscation) => {
                for holding in confiscation.targets.iter().chain(std::iter::once(&confiscation.deposit)) {
                    self.holdings
                        .save(&contract.address, &confiscation.asset_code, holding)
                        .await?;
                }
                info!(asset = %confiscation.asset_code, deposit = %confiscation.deposit.address, "confiscation applied");
            }
            EnforcementPlan::Reconciliation(reconciliation) => {
                for holding in &reconciliation.targets {
                    self.holdings
                        .save(&contract.address, &reconciliation.asset_code, holding)
                        .await?;
                }
                info!(asset = %reconciliation.asset_code, "reconciliation applied");
            }
        }
        Ok(())
    }

    async fn commit_freeze(
        &self,
        contract: &mut Contract,
        plan: &FreezePlan,
        freeze_txid: TxId,
        now: Timestamp,
    ) -> EnforcementResult<()> {
        let entity_expiry = if plan.expires.is_zero() { INDEFINITE } else { plan.expires };
        match &plan.scope {
            FreezeScope::Holdings { targets } => {
                let asset_code = scope_asset(plan.asset_code)?;
                for target in targets {
                    let mut holding = self
                        .holdings
                        .get(&contract.address, &asset_code, &target.address, now)
                        .await?;
                    holding.add_freeze(freeze_txid, target.quantity, plan.expires, now)?;
                    self.holdings.save(&contract.address, &asset_code, &holding).await?;
                }
            }
            FreezeScope::Asset { asset_code } => {
                self.set_asset_freeze(contract, asset_code, entity_expiry, now).await?;
            }
            FreezeScope::Contract => {
                contract.freeze_period = entity_expiry;
                contract.updated_at = now;
                self.state.save_contract(contract).await?;
            }
        }

        let record = FreezeRecord {
            freeze_txid,
            asset_code: plan.asset_code,
            scope: plan.scope.clone(),
            expires: plan.expires,
            created_at: now,
        };
        self.freezes.save(&contract.address, &record).await?;
        info!(%freeze_txid, expires = %plan.expires, "freeze applied");
        Ok(())
    }

    async fn commit_thaw(&self, contract: &mut Contract, record: &FreezeRecord, now: Timestamp) -> EnforcementResult<()> {
        match &record.scope {
            FreezeScope::Holdings { targets } => {
                let asset_code = scope_asset(record.asset_code)?;
                for target in targets {
                    let mut holding = self
                        .holdings
                        .get(&contract.address, &asset_code, &target.address, now)
                        .await?;
                    if holding.remove_freeze(&record.freeze_txid, now) {
                        self.holdings.save(&contract.address, &asset_code, &holding).await?;
                    } else {
                        warn!(address = %target.address, freeze_txid = %record.freeze_txid, "freeze status missing on thaw");
                    }
                }
            }
            FreezeScope::Asset { asset_code } => {
                self.set_asset_freeze(contract, asset_code, Timestamp::ZERO, now).await?;
            }
            FreezeScope::Contract => {
                contract.freeze_period = Timestamp::ZERO;
                contract.updated_at = now;
                self.state.save_contract(contract).await?;
            }
        }

        self.freezes.remove(&contract.address, &record.freeze_txid).await?;
        info!(freeze_txid = %record.freeze_txid, "freeze thawed");
        Ok(())
    }

    async fn set_asset_freeze(
        &self,
        contract: &Contract,
        asset_code: &AssetCode,
        freeze_period: Timestamp,
        now: Timestamp,
    ) -> EnforcementResult<()> {
        let mut asset = self
            .state
            .fetch_asset(contract, asset_code)
            .await?
            .ok_or(EnforcementError::AssetNotFound(*asset_code))?;
        asset.freeze_period = freeze_period;
        asset.updated_at = now;
        self.state.save_asset(&asset).await?;
        Ok(())
    }
}

fn plan_freeze(
    contract: &Contract,
    asset: Option<&Asset>,
    order: &Order,
    now: Timestamp,
) -> EnforcementResult<FreezePlan> {
    if !order.freeze_period.is_zero() && order.freeze_period <= now {
        return Err(EnforcementError::Malformed("freeze period already passed".to_string()));
    }

    let whole = matches!(order.target_addresses.as_slice(), [only] if only.address == contract.address);
    let scope = if whole {
        match asset {
            Some(asset) => FreezeScope::Asset { asset_code: asset.code },
            None => FreezeScope::Contract,
        }
    } else {
        if asset.is_none() {
            return Err(EnforcementError::Malformed("holding freeze without asset".to_string()));
        }
        check_targets(&order.target_addresses)?;
        FreezeScope::Holdings {
            targets: order.target_addresses.clone(),
        }
    };

    Ok(FreezePlan {
        asset_code: order.asset_code,
        scope,
        expires: order.freeze_period,
    })
}

fn require_asset<'a>(asset: Option<&'a Asset>, order: &Order) -> EnforcementResult<&'a Asset> {
    asset.ok_or_else(|| {
        EnforcementError::Malformed(format!("{:?} order without asset", order.compliance_action))
    })
}

fn scope_asset(asset_code: Option<AssetCode>) -> EnforcementResult<AssetCode> {
    asset_code.ok_or_else(|| EnforcementError::Malformed("holding freeze without asset".to_string()))
}

fn check_targets(targets: &[TargetAddress]) -> EnforcementResult<()> {
    if targets.is_empty() {
        return Err(EnforcementError::Malformed("no target addresses".to_string()));
    }
    let mut seen = HashSet::new();
    for target in targets {
        if target.quantity == 0 {
            return Err(EnforcementError::Malformed(format!("zero quantity for {}", target.address)));
        }
        if !seen.insert(target.address) {
            return Err(EnforcementError::Malformed(format!("{} targeted more than once", target.address)));
        }
    }
    Ok(())
}
