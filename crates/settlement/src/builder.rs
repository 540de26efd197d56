//! Settlement transaction construction
//!
//! The settlement spends every contract output of the transfer, so each
//! contract must sign it. Its outputs notify every token sender and receiver
//! (one dust output per address) and pay bitcoin receivers from the first
//! contract's output. Each contract then adds its [`AssetSettlement`]s and,
//! when it charges one, its contract fee output.

use crate::error::{SettlementError, SettlementResult};
use crate::layout::TransferLayout;
use smartledger_core::{Address, Timestamp};
use smartledger_protocol::{
    Action, AssetSettlement, FundingPolicy, OutPoint, ProtocolError, Settlement, Transaction, Transfer, TxInput,
    TxOutput,
};
use std::collections::HashMap;

fn malformed(message: impl Into<String>) -> SettlementError {
    SettlementError::Malformed(message.into())
}

fn base_inputs(tx: &Transaction, layout: &TransferLayout) -> SettlementResult<Vec<TxInput>> {
    layout
        .contracts()
        .map(|address| {
            let index = layout
                .contract_output(address)
                .ok_or_else(|| malformed("contract output missing"))?;
            let output = tx.output(index).ok_or_else(|| malformed("contract output missing"))?;
            Ok(TxInput::new(OutPoint::new(tx.txid, index), *address, output.value))
        })
        .collect()
}

fn base_outputs(
    tx: &Transaction,
    transfer: &Transfer,
    layout: &TransferLayout,
    policy: &FundingPolicy,
) -> SettlementResult<Vec<TxOutput>> {
    let first_output = layout
        .contract_output(layout.first())
        .ok_or_else(|| malformed("first contract output missing"))?;
    let mut contract_balance = tx.output(first_output).map_or(0, |o| o.value);

    let mut outputs: Vec<TxOutput> = Vec::new();
    let mut positions: HashMap<Address, usize> = HashMap::new();

    for (offset, asset) in transfer.assets.iter().enumerate() {
        let is_bitcoin = asset.asset_code.is_bitcoin();
        let mut balance: u64 = 0;

        for sender in &asset.senders {
            let input = tx
                .inputs
                .get(sender.index as usize)
                .ok_or_else(|| malformed(format!("sender index out of range for asset {}", offset)))?;
            balance = balance.saturating_add(sender.quantity);

            if is_bitcoin {
                if sender.quantity >= input.value {
                    return Err(malformed(format!(
                        "bitcoin sender quantity {} not below input value {}",
                        sender.quantity, input.value
                    )));
                }
            } else if !positions.contains_key(&input.address) {
                positions.insert(input.address, outputs.len());
                outputs.push(TxOutput::new(input.address, policy.dust_limit));
            }
        }

        for receiver in &asset.receivers {
            if receiver.quantity > balance {
                return Err(malformed(format!("asset {} receives more than it sends", offset)));
            }
            balance -= receiver.quantity;

            if is_bitcoin {
                if receiver.quantity > contract_balance {
                    return Err(malformed("bitcoin sent exceeds contract funding"));
                }
                contract_balance -= receiver.quantity;
            }

            match positions.get(&receiver.address) {
                Some(&position) if is_bitcoin => {
                    outputs[position].value = outputs[position].value.saturating_add(receiver.quantity)
                }
                Some(_) => {}
                None => {
                    positions.insert(receiver.address, outputs.len());
                    let value = if is_bitcoin {
                        receiver.quantity
                    } else {
                        policy.dust_limit
                    };
                    outputs.push(TxOutput::new(receiver.address, value));
                }
            }
        }
    }

    Ok(outputs)
}

/// Settlement skeleton with no asset settlements yet
pub fn build_settlement(
    tx: &Transaction,
    transfer: &Transfer,
    layout: &TransferLayout,
    policy: &FundingPolicy,
    now: Timestamp,
) -> SettlementResult<Transaction> {
    let inputs = base_inputs(tx, layout)?;
    let outputs = base_outputs(tx, transfer, layout, policy)?;
    let action = Action::Settlement(Settlement {
        assets: Vec::new(),
        timestamp: now,
    });
    Ok(Transaction::new(inputs, outputs, action)?)
}

/// Check that a settlement received from another contract spends the
/// transfer's contract outputs and starts with the expected outputs
pub fn check_base(
    settle: &Transaction,
    tx: &Transaction,
    transfer: &Transfer,
    layout: &TransferLayout,
    policy: &FundingPolicy,
) -> SettlementResult<()> {
    if !settle.is_consistent() {
        return Err(malformed("settlement id does not match content"));
    }

    let inputs = base_inputs(tx, layout)?;
    let inputs_match = settle.inputs.len() == inputs.len()
        && settle
            .inputs
            .iter()
            .zip(&inputs)
            .all(|(a, b)| a.outpoint == b.outpoint && a.address == b.address && a.value == b.value);
    if !inputs_match {
        return Err(malformed("settlement inputs do not match transfer"));
    }

    let outputs = base_outputs(tx, transfer, layout, policy)?;
    if !settle.outputs.starts_with(&outputs) {
        return Err(malformed("settlement outputs do not match transfer"));
    }
    Ok(())
}

pub fn settlement_of(tx: &Transaction) -> SettlementResult<&Settlement> {
    match &tx.action {
        Action::Settlement(settlement) => Ok(settlement),
        other => Err(malformed(format!("expected settlement, found {}", other.name()))),
    }
}

/// Add or replace asset settlements, then recompute the id
pub fn merge_assets(settle: &mut Transaction, assets: Vec<AssetSettlement>) -> SettlementResult<()> {
    let Action::Settlement(settlement) = &mut settle.action else {
        return Err(malformed("settlement action missing"));
    };
    for asset in assets {
        match settlement.assets.iter_mut().find(|a| a.asset_code == asset.asset_code) {
            Some(existing) => *existing = asset,
            None => settlement.assets.push(asset),
        }
    }
    settle.rehash()?;
    Ok(())
}

/// Whether every token asset of the transfer has settlement data
pub fn is_complete(transfer: &Transfer, settlement: &Settlement) -> bool {
    transfer
        .assets
        .iter()
        .filter(|a| !a.asset_code.is_bitcoin())
        .all(|a| settlement.assets.iter().any(|s| s.asset_code == a.asset_code))
}

/// Settlement inputs must cover its outputs and the response fee
pub fn check_funding(settle: &Transaction, policy: &FundingPolicy) -> SettlementResult<()> {
    let available: u64 = settle.inputs.iter().map(|i| i.value).sum();
    let required = settle.outputs.iter().map(|o| o.value).sum::<u64>() + policy.response_fee;
    if available < required {
        return Err(ProtocolError::InsufficientFunding { required, available }.into());
    }
    Ok(())
}
