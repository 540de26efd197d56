//! Validated orders, ready to answer and commit
//!
//! A plan lists the addresses the response pays (in output order, before the
//! contract's own output) and builds the response action. Quantity indices
//! in the action refer to those outputs.

use crate::repository::{FreezeRecord, FreezeScope};
use smartledger_core::{Address, AssetCode, Timestamp};
use smartledger_holdings::Holding;
use smartledger_protocol::{Action, Confiscation, Freeze, QuantityIndex, Reconciliation, Thaw};

#[derive(Debug, Clone, PartialEq)]
pub struct FreezePlan {
    pub asset_code: Option<AssetCode>,
    pub scope: FreezeScope,
    pub expires: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThawPlan {
    pub record: FreezeRecord,
}

/// Holdings after moving finalized tokens to the deposit address
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiscationPlan {
    pub asset_code: AssetCode,
    pub targets: Vec<Holding>,
    pub deposit: Holding,
}

/// Holdings after removing finalized tokens, with bitcoin paid per target
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub asset_code: AssetCode,
    pub targets: Vec<Holding>,
    pub dispersions: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnforcementPlan {
    Freeze(FreezePlan),
    Thaw(ThawPlan),
    Confiscation(ConfiscationPlan),
    Reconciliation(ReconciliationPlan),
}

impl EnforcementPlan {
    /// Response recipients with the bitcoin each receives; zero means a
    /// notification output only
    pub fn recipients(&self) -> Vec<(Address, u64)> {
        match self {
            EnforcementPlan::Freeze(plan) => scope_targets(&plan.scope),
            EnforcementPlan::Thaw(plan) => scope_targets(&plan.record.scope),
            EnforcementPlan::Confiscation(plan) => plan
                .targets
                .iter()
                .chain(std::iter::once(&plan.deposit))
                .map(|h| (h.address, 0))
                .collect(),
            EnforcementPlan::Reconciliation(plan) => plan
                .targets
                .iter()
                .zip(plan.dispersions.iter())
                .map(|(h, value)| (h.address, *value))
                .collect(),
        }
    }

    /// Response action for this plan
    pub fn action(&self, now: Timestamp) -> Action {
        match self {
            EnforcementPlan::Freeze(plan) => {
                let quantities = match &plan.scope {
                    FreezeScope::Holdings { targets } => targets
                        .iter()
                        .enumerate()
                        .map(|(i, t)| QuantityIndex::new(i as u32, t.quantity))
                        .collect(),
                    // Index 0 is the contract's own output
                    _ => vec![QuantityIndex::new(0, 0)],
                };
                Action::Freeze(Freeze {
                    asset_code: plan.asset_code,
                    quantities,
                    freeze_period: plan.expires,
                    timestamp: now,
                })
            }
            EnforcementPlan::Thaw(plan) => Action::Thaw(Thaw {
                freeze_txid: plan.record.freeze_txid,
                timestamp: now,
            }),
            EnforcementPlan::Confiscation(plan) => Action::Confiscation(Confiscation {
                asset_code: plan.asset_code,
                quantities: remaining(&plan.targets),
                deposit_qty: plan.deposit.finalized_balance,
                timestamp: now,
            }),
            EnforcementPlan::Reconciliation(plan) => Action::Reconciliation(Reconciliation {
                asset_code: plan.asset_code,
                quantities: remaining(&plan.targets),
                timestamp: now,
            }),
        }
    }
}

fn scope_targets(scope: &FreezeScope) -> Vec<(Address, u64)> {
    match scope {
        FreezeScope::Holdings { targets } => targets.iter().map(|t| (t.address, 0)).collect(),
        FreezeScope::Asset { .. } | FreezeScope::Contract => Vec::new(),
    }
}

fn remaining(targets: &[Holding]) -> Vec<QuantityIndex> {
    targets
        .iter()
        .enumerate()
        .map(|(i, h)| QuantityIndex::new(i as u32, h.finalized_balance))
        .collect()
}
