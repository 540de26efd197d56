//! In-flight transfers

use crate::error::{SettlementError, SettlementResult};
use crate::state::TransferState;
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, Timestamp, TxId};
use smartledger_protocol::OutPoint;
use smartledger_storage::{get_json, put_json, Store};
use std::sync::Arc;
use tracing::debug;

/// A transfer this contract reserved holdings for and has not yet settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub transfer_txid: TxId,
    pub state: TransferState,
    /// Whether this contract received the first contract output
    pub originator: bool,
    /// Contracts taking part, in settlement order
    pub participants: Vec<Address>,
    /// Zero when no timeout is scheduled here
    pub timeout: Timestamp,
    #[serde(default)]
    pub job_id: Option<String>,
    /// Transfer output funding the messages between contracts
    #[serde(default)]
    pub boomerang: Option<OutPoint>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PendingTransfer {
    pub fn new(transfer_txid: TxId, originator: bool, participants: Vec<Address>, now: Timestamp) -> Self {
        Self {
            transfer_txid,
            state: TransferState::Requested,
            originator,
            participants,
            timeout: Timestamp::ZERO,
            job_id: None,
            boomerang: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, next: TransferState, now: Timestamp) -> SettlementResult<()> {
        if !self.state.can_advance_to(next) {
            return Err(SettlementError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(transfer = %self.transfer_txid, from = %self.state, to = %next, "transfer state");
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_timed_out(&self, now: Timestamp) -> bool {
        !self.timeout.is_zero() && self.timeout <= now
    }
}

fn pending_key(contract: &Address, transfer_txid: &TxId) -> String {
    format!("contracts/{}/transfers/{}", contract, transfer_txid)
}

#[derive(Clone)]
pub struct PendingRepository {
    store: Arc<dyn Store>,
}

impl PendingRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, contract: &Address, transfer_txid: &TxId) -> SettlementResult<Option<PendingTransfer>> {
        Ok(get_json(self.store.as_ref(), &pending_key(contract, transfer_txid)).await?)
    }

    pub async fn save(&self, contract: &Address, pending: &PendingTransfer) -> SettlementResult<()> {
        put_json(self.store.as_ref(), &pending_key(contract, &pending.transfer_txid), pending).await?;
        Ok(())
    }

    /// Returns whether a pending transfer was removed
    pub async fn remove(&self, contract: &Address, transfer_txid: &TxId) -> SettlementResult<bool> {
        Ok(self.store.remove(&pending_key(contract, transfer_txid)).await?)
    }

    pub async fn list(&self, contract: &Address) -> SettlementResult<Vec<PendingTransfer>> {
        let prefix = format!("contracts/{}/transfers/", contract);
        let mut result = Vec::new();
        for key in self.store.list(&prefix).await? {
            if let Some(pending) = get_json::<PendingTransfer>(self.store.as_ref(), &key).await? {
                result.push(pending);
            }
        }
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartledger_storage::MemoryStore;

    #[test]
    fn test_advance_rejects_illegal_step() {
        let mut pending = PendingTransfer::new(TxId::new([1; 32]), true, vec![], Timestamp::from_secs(1));
        assert!(pending.advance(TransferState::Settled, Timestamp::from_secs(2)).is_err());
        pending.advance(TransferState::Reserved, Timestamp::from_secs(2)).unwrap();
        pending
            .advance(TransferState::AwaitingSettlementRequest, Timestamp::from_secs(3))
            .unwrap();
        assert_eq!(pending.updated_at, Timestamp::from_secs(3));
    }

    #[tokio::test]
    async fn test_repository_round_trip() {
        let repo = PendingRepository::new(Arc::new(MemoryStore::new()));
        let contract = Address::new([9; 20]);
        let mut pending = PendingTransfer::new(TxId::new([1; 32]), true, vec![contract], Timestamp::from_secs(1));
        pending.timeout = Timestamp::from_secs(61);
        repo.save(&contract, &pending).await.unwrap();

        let loaded = repo.fetch(&contract, &pending.transfer_txid).await.unwrap().unwrap();
        assert!(loaded.is_timed_out(Timestamp::from_secs(61)));
        assert!(!loaded.is_timed_out(Timestamp::from_secs(60)));
        assert_eq!(repo.list(&contract).await.unwrap().len(), 1);

        assert!(repo.remove(&contract, &pending.transfer_txid).await.unwrap());
        assert!(!repo.remove(&contract, &pending.transfer_txid).await.unwrap());
    }
}
