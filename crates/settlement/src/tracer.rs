//! Traces message chains back to the transfer they serve
//!
//! The boomerang output of a transfer funds the messages between contracts.
//! Each traced outpoint maps to the transfer; a transaction spending a traced
//! outpoint belongs to the same transfer.

use crate::error::SettlementResult;
use smartledger_core::{Address, TxId};
use smartledger_protocol::{OutPoint, Transaction};
use smartledger_storage::{get_json, put_json, Store};
use std::sync::Arc;

fn trace_key(contract: &Address, outpoint: &OutPoint) -> String {
    format!("contracts/{}/tracer/{}:{}", contract, outpoint.txid, outpoint.index)
}

#[derive(Clone)]
pub struct Tracer {
    store: Arc<dyn Store>,
}

impl Tracer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn add(&self, contract: &Address, outpoint: &OutPoint, transfer_txid: &TxId) -> SettlementResult<()> {
        put_json(self.store.as_ref(), &trace_key(contract, outpoint), transfer_txid).await?;
        Ok(())
    }

    /// Trace every output of a message sent for `transfer_txid`
    pub async fn add_outputs(&self, contract: &Address, tx: &Transaction, transfer_txid: &TxId) -> SettlementResult<()> {
        for index in 0..tx.outputs.len() as u32 {
            self.add(contract, &OutPoint::new(tx.txid, index), transfer_txid).await?;
        }
        Ok(())
    }

    /// Transfer served by a transaction spending a traced outpoint
    pub async fn retrace(&self, contract: &Address, tx: &Transaction) -> SettlementResult<Option<TxId>> {
        for input in &tx.inputs {
            if let Some(txid) = get_json::<TxId>(self.store.as_ref(), &trace_key(contract, &input.outpoint)).await? {
                return Ok(Some(txid));
            }
        }
        Ok(None)
    }

    /// Drop every trace of `transfer_txid`
    pub async fn remove(&self, contract: &Address, transfer_txid: &TxId) -> SettlementResult<usize> {
        let prefix = format!("contracts/{}/tracer/", contract);
        let mut removed = 0;
        for key in self.store.list(&prefix).await? {
            if get_json::<TxId>(self.store.as_ref(), &key).await? == Some(*transfer_txid) && self.store.remove(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
