//! Holdings side of a transfer: reserve, verify, finalize and revert
//!
//! Every holding status is keyed by the transfer transaction id, so all
//! four steps find the same reservation whichever transaction carries them.

use crate::builder::settlement_of;
use crate::error::{SettlementError, SettlementResult};
use smartledger_core::{Address, AssetCode, Timestamp};
use smartledger_holdings::{Holding, HoldingsCache};
use smartledger_protocol::{AssetSettlement, AssetTransfer, QuantityIndex, Transaction, Transfer};
use smartledger_state::{Contract, StateRepository};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Reserved holdings, not yet saved
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub assets: Vec<AssetSettlement>,
    pub holdings: Vec<(AssetCode, Holding)>,
}

#[derive(Clone)]
pub struct TransferLedger {
    holdings: Arc<HoldingsCache>,
    state: StateRepository,
}

fn malformed(message: impl Into<String>) -> SettlementError {
    SettlementError::Malformed(message.into())
}

/// Asset transfers whose contract output pays `contract`
fn own_assets<'a>(
    contract: &'a Address,
    tx: &'a Transaction,
    transfer: &'a Transfer,
) -> impl Iterator<Item = &'a AssetTransfer> + 'a {
    transfer.assets.iter().filter(move |asset| {
        !asset.asset_code.is_bitcoin()
            && tx
                .output(asset.contract_index)
                .is_some_and(|output| output.address == *contract)
    })
}

fn settle_output(settle: &Transaction, address: &Address) -> SettlementResult<u32> {
    settle
        .output_indices(address)
        .first()
        .copied()
        .ok_or_else(|| malformed(format!("no settlement output for {}", address)))
}

fn contract_input(settle: &Transaction, contract: &Address) -> SettlementResult<u32> {
    settle
        .inputs
        .iter()
        .position(|input| input.address == *contract)
        .map(|i| i as u32)
        .ok_or_else(|| malformed("contract input missing from settlement"))
}

fn sender_address(tx: &Transaction, index: u32) -> SettlementResult<Address> {
    tx.inputs
        .get(index as usize)
        .map(|input| input.address)
        .ok_or_else(|| malformed(format!("sender index {} out of range", index)))
}

impl TransferLedger {
    pub fn new(holdings: Arc<HoldingsCache>, state: StateRepository) -> Self {
        Self { holdings, state }
    }

    pub fn holdings(&self) -> &Arc<HoldingsCache> {
        &self.holdings
    }

    /// Reserve this contract's side of a transfer against `settle`'s outputs
    ///
    /// Debits and deposits are recorded under the transfer id; nothing is
    /// saved until [`TransferLedger::commit`].
    pub async fn reserve(
        &self,
        contract: &Contract,
        tx: &Transaction,
        transfer: &Transfer,
        settle: &Transaction,
        single_contract: bool,
        now: Timestamp,
    ) -> SettlementResult<Reservation> {
        let contract_index = contract_input(settle, &contract.address)?;
        let admin = contract.admin_address();
        let mut reservation = Reservation {
            assets: Vec::new(),
            holdings: Vec::new(),
        };

        for asset_transfer in own_assets(&contract.address, tx, transfer) {
            let code = asset_transfer.asset_code;
            let asset = self
                .state
                .fetch_asset(contract, &code)
                .await?
                .ok_or(SettlementError::AssetNotFound(code))?;
            if asset.is_frozen(now) {
                return Err(SettlementError::AssetFrozen(code));
            }

            let mut touched: BTreeMap<u32, Holding> = BTreeMap::new();
            let mut send_balance: u64 = 0;
            let (mut from_admin, mut from_others, mut to_admin, mut to_others) = (0u64, 0u64, 0u64, 0u64);

            for sender in &asset_transfer.senders {
                let address = sender_address(tx, sender.index)?;
                let index = settle_output(settle, &address)?;
                if touched.contains_key(&index) {
                    warn!(asset = %code, party = %address, "duplicate sender");
                    return Err(malformed(format!("duplicate party {}", address)));
                }
                if address == admin {
                    from_admin = from_admin.saturating_add(sender.quantity);
                } else {
                    from_others = from_others.saturating_add(sender.quantity);
                }

                let mut holding = self.holdings.get(&contract.address, &code, &address, now).await?;
                if let Err(e) = holding.add_debit(tx.txid, sender.quantity, single_contract, now) {
                    warn!(asset = %code, party = %address, quantity = sender.quantity, "debit refused: {}", e);
                    return Err(e.into());
                }
                info!(asset = %code, party = %address, quantity = sender.quantity, "debit");
                send_balance = send_balance.saturating_add(sender.quantity);
                touched.insert(index, holding);
            }

            for receiver in &asset_transfer.receivers {
                let index = settle_output(settle, &receiver.address)?;
                if touched.contains_key(&index) {
                    warn!(asset = %code, party = %receiver.address, "duplicate receiver");
                    return Err(malformed(format!("duplicate party {}", receiver.address)));
                }
                if receiver.address == admin {
                    to_admin = to_admin.saturating_add(receiver.quantity);
                } else {
                    to_others = to_others.saturating_add(receiver.quantity);
                }

                let mut holding = self
                    .holdings
                    .get(&contract.address, &code, &receiver.address, now)
                    .await?;
                holding.add_deposit(tx.txid, receiver.quantity, single_contract, now)?;
                info!(asset = %code, party = %receiver.address, quantity = receiver.quantity, "deposit");

                if receiver.quantity > send_balance {
                    return Err(malformed(format!("asset {} receives more than it sends", code)));
                }
                send_balance -= receiver.quantity;
                touched.insert(index, holding);
            }

            if send_balance != 0 {
                return Err(malformed(format!("asset {} leaves {} unsent", code, send_balance)));
            }

            if !asset.terms.transfers_permitted && (from_others > to_admin || to_others > from_admin) {
                warn!(asset = %code, "transfer outside the administration");
                return Err(SettlementError::TransfersNotPermitted(code));
            }

            reservation.assets.push(AssetSettlement {
                contract_index,
                asset_code: code,
                settlements: touched
                    .iter()
                    .map(|(index, holding)| QuantityIndex::new(*index, holding.pending_balance))
                    .collect(),
            });
            reservation
                .holdings
                .extend(touched.into_values().map(|holding| (code, holding)));
        }

        if reservation.assets.is_empty() {
            return Err(malformed("no assets of this contract in transfer"));
        }
        Ok(reservation)
    }

    pub async fn commit(&self, contract: &Address, reservation: &Reservation) -> SettlementResult<()> {
        for (code, holding) in &reservation.holdings {
            self.holdings.save(contract, code, holding).await?;
        }
        Ok(())
    }

    /// Check a completed settlement against this contract's reservations
    /// and every signature already on it
    pub async fn verify(
        &self,
        contract: &Address,
        tx: &Transaction,
        transfer: &Transfer,
        settle: &Transaction,
        now: Timestamp,
    ) -> SettlementResult<()> {
        for index in 0..settle.inputs.len() {
            if settle.inputs[index].signature.is_some() && !settle.verify_input(index)? {
                return Err(SettlementError::InvalidSignature(index));
            }
        }

        let settlement = settlement_of(settle)?;
        let contract_index = contract_input(settle, contract)?;

        for asset_transfer in own_assets(contract, tx, transfer) {
            let code = asset_transfer.asset_code;
            let entry = settlement
                .assets
                .iter()
                .find(|a| a.asset_code == code && a.contract_index == contract_index)
                .ok_or_else(|| malformed(format!("settlement missing asset {}", code)))?;

            let mut expected = Vec::new();
            for sender in &asset_transfer.senders {
                let address = sender_address(tx, sender.index)?;
                let holding = self.holdings.get(contract, &code, &address, now).await?;
                let quantity = holding.check_debit(&tx.txid, sender.quantity)?;
                expected.push(QuantityIndex::new(settle_output(settle, &address)?, quantity));
            }
            for receiver in &asset_transfer.receivers {
                let holding = self.holdings.get(contract, &code, &receiver.address, now).await?;
                let quantity = holding.check_deposit(&tx.txid, receiver.quantity)?;
                expected.push(QuantityIndex::new(settle_output(settle, &receiver.address)?, quantity));
            }

            expected.sort_by_key(|q| q.index);
            let mut actual = entry.settlements.clone();
            actual.sort_by_key(|q| q.index);
            if expected != actual {
                return Err(malformed(format!("settlement quantities differ for asset {}", code)));
            }
        }
        Ok(())
    }

    /// Apply an observed settlement to this contract's holdings
    ///
    /// Returns the number of holdings finalized.
    pub async fn finalize(&self, contract: &Address, settle: &Transaction, now: Timestamp) -> SettlementResult<usize> {
        let settlement = settlement_of(settle)?;
        let transfer_txid = settle
            .ref_txid()
            .ok_or_else(|| malformed("settlement has no inputs"))?;

        let mut updates: Vec<(AssetCode, Holding)> = Vec::new();
        for asset in &settlement.assets {
            if asset.asset_code.is_bitcoin() {
                continue;
            }
            let owner = settle
                .inputs
                .get(asset.contract_index as usize)
                .ok_or_else(|| malformed("settlement contract index out of range"))?;
            if owner.address != *contract {
                continue;
            }

            for quantity in &asset.settlements {
                let output = settle
                    .output(quantity.index)
                    .ok_or_else(|| malformed("settlement output index out of range"))?;
                let mut holding = self
                    .holdings
                    .get(contract, &asset.asset_code, &output.address, now)
                    .await?;
                holding.finalize_tx(&transfer_txid, quantity.quantity, now)?;
                info!(
                    asset = %asset.asset_code,
                    party = %output.address,
                    balance = holding.finalized_balance,
                    "settled"
                );
                updates.push((asset.asset_code, holding));
            }
        }

        for (code, holding) in &updates {
            self.holdings.save(contract, code, holding).await?;
        }
        Ok(updates.len())
    }

    /// Undo every reservation this contract holds for a transfer
    ///
    /// Returns the number of holdings changed; zero when already reverted.
    pub async fn revert(
        &self,
        contract: &Address,
        tx: &Transaction,
        transfer: &Transfer,
        now: Timestamp,
    ) -> SettlementResult<usize> {
        let mut reverted = 0;
        for asset_transfer in own_assets(contract, tx, transfer) {
            let code = asset_transfer.asset_code;
            let mut parties: Vec<Address> = Vec::new();
            for sender in &asset_transfer.senders {
                if let Some(input) = tx.inputs.get(sender.index as usize) {
                    parties.push(input.address);
                }
            }
            parties.extend(asset_transfer.receivers.iter().map(|r| r.address));
            parties.dedup();

            for address in parties {
                let mut holding = self.holdings.get(contract, &code, &address, now).await?;
                if holding.revert_status(&tx.txid, now) {
                    self.holdings.save(contract, &code, &holding).await?;
                    reverted += 1;
                }
            }
        }
        Ok(reverted)
    }
}
