//! Which contracts a transfer involves, and in what order
//!
//! A transfer pays one output to each contract whose asset moves (the
//! contract output of each asset transfer). The first contract to appear
//! builds the settlement and holds the bitcoin being moved. When several
//! contracts take part, an extra output to the first contract (the
//! boomerang, referenced by no asset transfer) funds the messages between
//! them.

use crate::error::{SettlementError, SettlementResult};
use smartledger_core::Address;
use smartledger_protocol::{Transaction, Transfer};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLayout {
    /// Contract address and its output index, in first-reference order
    contracts: Vec<(Address, u32)>,
}

impl TransferLayout {
    pub fn new(tx: &Transaction, transfer: &Transfer) -> SettlementResult<Self> {
        if transfer.assets.is_empty() {
            return Err(SettlementError::Malformed("no asset transfers".into()));
        }

        let mut contracts: Vec<(Address, u32)> = Vec::new();
        for (offset, asset) in transfer.assets.iter().enumerate() {
            if asset.asset_code.is_bitcoin() {
                continue;
            }
            let output = tx.output(asset.contract_index).ok_or_else(|| {
                SettlementError::Malformed(format!("contract index out of range for asset {}", offset))
            })?;
            if !contracts.iter().any(|(address, _)| *address == output.address) {
                contracts.push((output.address, asset.contract_index));
            }
        }

        if contracts.is_empty() {
            return Err(SettlementError::Malformed("no contract in transfer".into()));
        }
        Ok(Self { contracts })
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Address> {
        self.contracts.iter().map(|(address, _)| address)
    }

    /// Transfer output paying `contract`
    pub fn contract_output(&self, contract: &Address) -> Option<u32> {
        self.contracts
            .iter()
            .find(|(address, _)| address == contract)
            .map(|(_, index)| *index)
    }

    pub fn first(&self) -> &Address {
        &self.contracts[0].0
    }

    pub fn is_first(&self, contract: &Address) -> bool {
        self.first() == contract
    }

    pub fn involves(&self, contract: &Address) -> bool {
        self.contract_output(contract).is_some()
    }

    pub fn is_single_contract(&self) -> bool {
        self.contracts.len() == 1
    }

    pub fn next_after(&self, contract: &Address) -> Option<Address> {
        let position = self.contracts.iter().position(|(address, _)| address == contract)?;
        self.contracts.get(position + 1).map(|(address, _)| *address)
    }

    pub fn previous_before(&self, contract: &Address) -> Option<Address> {
        let position = self.contracts.iter().position(|(address, _)| address == contract)?;
        position.checked_sub(1).map(|p| self.contracts[p].0)
    }

    /// Output to the first contract that no asset transfer spends
    pub fn boomerang_index(&self, tx: &Transaction) -> Option<u32> {
        let used: BTreeSet<u32> = self.contracts.iter().map(|(_, index)| *index).collect();
        tx.output_indices(self.first())
            .into_iter()
            .find(|index| !used.contains(index))
    }
}
