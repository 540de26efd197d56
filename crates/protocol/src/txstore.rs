//! Transactions seen by a contract

use crate::error::ProtocolResult;
use crate::tx::Transaction;
use smartledger_core::{Address, TxId};
use smartledger_storage::{get_json, put_json, Store};
use std::sync::Arc;

fn tx_key(contract: &Address, txid: &TxId) -> String {
    format!("contracts/{}/transactions/{}", contract, txid)
}

#[derive(Clone)]
pub struct TransactionRepository {
    store: Arc<dyn Store>,
}

impl TransactionRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn save(&self, contract: &Address, tx: &Transaction) -> ProtocolResult<()> {
        put_json(self.store.as_ref(), &tx_key(contract, &tx.txid), tx).await?;
        Ok(())
    }

    pub async fn fetch(&self, contract: &Address, txid: &TxId) -> ProtocolResult<Option<Transaction>> {
        Ok(get_json(self.store.as_ref(), &tx_key(contract, txid)).await?)
    }
}
