//! Per-address balances
//!
//! ```text
//!                 add_debit / add_deposit          finalize_tx
//! finalized ──────────────► pending diverges ─────────────────► finalized catches up
//!     ▲                            │
//!     └──────── revert_status ◄────┘
//! ```
//!
//! `pending_balance` moves when a transfer reserves; `finalized_balance`
//! moves only when the settlement is observed. Freezes never touch either
//! balance, they only reduce what can be spent.

use crate::error::{HoldingsError, HoldingsResult};
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, Timestamp, TxId};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HoldingStatusCode {
    Freeze,
    Debit,
    Deposit,
    MultiContractDebit,
    MultiContractDeposit,
}

impl HoldingStatusCode {
    pub fn is_debit(&self) -> bool {
        matches!(self, Self::Debit | Self::MultiContractDebit)
    }

    pub fn is_deposit(&self) -> bool {
        matches!(self, Self::Deposit | Self::MultiContractDeposit)
    }

    /// Multi-contract statuses lock the holding until the transfer ends
    pub fn is_lock(&self) -> bool {
        matches!(self, Self::MultiContractDebit | Self::MultiContractDeposit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingStatus {
    pub code: HoldingStatusCode,
    pub txid: TxId,
    pub amount: u64,
    /// Pending balance right after this status was added
    pub settle_quantity: u64,
    pub created_at: Timestamp,
    /// Zero means never
    #[serde(default)]
    pub expires: Timestamp,
}

impl HoldingStatus {
    /// Expired freezes stop counting; nothing evicts them
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.expires.is_zero() || now < self.expires
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub address: Address,
    pub pending_balance: u64,
    pub finalized_balance: u64,
    #[serde(default)]
    pub statuses: BTreeMap<TxId, HoldingStatus>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Holding {
    pub fn new(address: Address, now: Timestamp) -> Self {
        Self {
            address,
            pending_balance: 0,
            finalized_balance: 0,
            statuses: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance spendable regardless of how in-flight transfers end
    pub fn safe_balance(&self) -> u64 {
        self.pending_balance.min(self.finalized_balance)
    }

    /// Total of freezes active at `now`
    pub fn frozen_balance(&self, now: Timestamp) -> u64 {
        self.statuses
            .values()
            .filter(|s| s.code == HoldingStatusCode::Freeze && s.is_active(now))
            .map(|s| s.amount)
            .fold(0u64, |total, amount| total.saturating_add(amount))
    }

    /// Finalized balance minus active freezes, floored at zero
    pub fn unfrozen_balance(&self, now: Timestamp) -> u64 {
        self.finalized_balance.saturating_sub(self.frozen_balance(now))
    }

    pub fn is_locked(&self) -> bool {
        self.statuses.values().any(|s| s.code.is_lock())
    }

    pub fn status(&self, txid: &TxId) -> Option<&HoldingStatus> {
        self.statuses.get(txid)
    }

    fn insert_status(&mut self, code: HoldingStatusCode, txid: TxId, amount: u64, expires: Timestamp, now: Timestamp) {
        self.statuses.insert(
            txid,
            HoldingStatus {
                code,
                txid,
                amount,
                settle_quantity: self.pending_balance,
                created_at: now,
                expires,
            },
        );
        self.updated_at = now;
    }

    /// Reserve an outgoing amount
    pub fn add_debit(&mut self, txid: TxId, amount: u64, single_contract: bool, now: Timestamp) -> HoldingsResult<()> {
        if self.statuses.contains_key(&txid) {
            return Err(HoldingsError::DuplicateEntry(txid));
        }

        let safe = self.safe_balance();
        if safe < amount {
            return Err(HoldingsError::InsufficientHoldings {
                available: safe,
                requested: amount,
            });
        }

        let unfrozen = safe.saturating_sub(self.frozen_balance(now));
        if unfrozen < amount {
            return Err(HoldingsError::HoldingsFrozen {
                unfrozen,
                requested: amount,
            });
        }

        if self.is_locked() {
            return Err(HoldingsError::HoldingsLocked);
        }

        self.pending_balance -= amount;
        let code = if single_contract {
            HoldingStatusCode::Debit
        } else {
            HoldingStatusCode::MultiContractDebit
        };
        self.insert_status(code, txid, amount, Timestamp::ZERO, now);
        Ok(())
    }

    /// Reserve an incoming amount
    pub fn add_deposit(&mut self, txid: TxId, amount: u64, single_contract: bool, now: Timestamp) -> HoldingsResult<()> {
        if self.statuses.contains_key(&txid) {
            return Err(HoldingsError::DuplicateEntry(txid));
        }
        if self.is_locked() {
            return Err(HoldingsError::HoldingsLocked);
        }

        self.pending_balance = self.pending_balance.saturating_add(amount);
        let code = if single_contract {
            HoldingStatusCode::Deposit
        } else {
            HoldingStatusCode::MultiContractDeposit
        };
        self.insert_status(code, txid, amount, Timestamp::ZERO, now);
        Ok(())
    }

    pub fn add_freeze(&mut self, txid: TxId, amount: u64, expires: Timestamp, now: Timestamp) -> HoldingsResult<()> {
        if self.statuses.contains_key(&txid) {
            return Err(HoldingsError::DuplicateEntry(txid));
        }
        self.insert_status(HoldingStatusCode::Freeze, txid, amount, expires, now);
        Ok(())
    }

    /// Returns whether a freeze was removed
    pub fn remove_freeze(&mut self, txid: &TxId, now: Timestamp) -> bool {
        match self.statuses.get(txid) {
            Some(status) if status.code == HoldingStatusCode::Freeze => {
                self.statuses.remove(txid);
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// Apply a settlement to the finalized balance
    ///
    /// Without a matching status (recovery, or a settlement this contract
    /// never reserved) both balances are set to `balance`.
    pub fn finalize_tx(&mut self, txid: &TxId, balance: u64, now: Timestamp) -> HoldingsResult<()> {
        self.updated_at = now;

        let Some(status) = self.statuses.get(txid) else {
            self.finalized_balance = balance;
            self.pending_balance = balance;
            return Ok(());
        };

        match status.code {
            code if code.is_debit() => {
                self.finalized_balance = self.finalized_balance.saturating_sub(status.amount);
            }
            code if code.is_deposit() => {
                self.finalized_balance = self.finalized_balance.saturating_add(status.amount);
            }
            _ => {
                return Err(HoldingsError::WrongStatus {
                    txid: *txid,
                    expected: "debit or deposit",
                })
            }
        }
        self.statuses.remove(txid);
        Ok(())
    }

    /// Undo a reservation. Returns whether a status existed.
    pub fn revert_status(&mut self, txid: &TxId, now: Timestamp) -> bool {
        let Some(status) = self.statuses.remove(txid) else {
            return false;
        };
        if status.code.is_debit() {
            self.pending_balance = self.pending_balance.saturating_add(status.amount);
        } else if status.code.is_deposit() {
            self.pending_balance = self.pending_balance.saturating_sub(status.amount);
        }
        self.updated_at = now;
        true
    }

    fn check_status(
        &self,
        txid: &TxId,
        amount: u64,
        expected: &'static str,
        matches: impl Fn(HoldingStatusCode) -> bool,
    ) -> HoldingsResult<&HoldingStatus> {
        let status = self
            .statuses
            .get(txid)
            .ok_or(HoldingsError::StatusNotFound(*txid))?;
        if !matches(status.code) {
            return Err(HoldingsError::WrongStatus {
                txid: *txid,
                expected,
            });
        }
        if status.amount != amount {
            return Err(HoldingsError::WrongAmount {
                txid: *txid,
                expected: amount,
                actual: status.amount,
            });
        }
        Ok(status)
    }

    /// Confirm a debit reservation and return its settle quantity
    pub fn check_debit(&self, txid: &TxId, amount: u64) -> HoldingsResult<u64> {
        self.check_status(txid, amount, "debit", |c| c.is_debit())
            .map(|s| s.settle_quantity)
    }

    /// Confirm a deposit reservation and return its settle quantity
    pub fn check_deposit(&self, txid: &TxId, amount: u64) -> HoldingsResult<u64> {
        self.check_status(txid, amount, "deposit", |c| c.is_deposit())
            .map(|s| s.settle_quantity)
    }

    pub fn check_freeze(&self, txid: &TxId, amount: u64) -> HoldingsResult<()> {
        self.check_status(txid, amount, "freeze", |c| c == HoldingStatusCode::Freeze)
            .map(|_| ())
    }

    /// Move finalized tokens out directly, bypassing the pending stage
    pub fn take_finalized(&mut self, amount: u64, now: Timestamp) -> u64 {
        let taken = amount.min(self.finalized_balance);
        self.finalized_balance -= taken;
        self.pending_balance = self.pending_balance.saturating_sub(taken);
        self.updated_at = now;
        taken
    }

    /// Credit finalized tokens directly, bypassing the pending stage
    pub fn credit_finalized(&mut self, amount: u64, now: Timestamp) {
        self.finalized_balance = self.finalized_balance.saturating_add(amount);
        self.pending_balance = self.pending_balance.saturating_add(amount);
        self.updated_at = now;
    }
}
