//! Active freezes, kept until thawed

use crate::error::EnforcementResult;
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, AssetCode, Timestamp, TxId};
use smartledger_protocol::TargetAddress;
use smartledger_storage::{get_json, put_json, Store};
use std::sync::Arc;

/// What a freeze applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FreezeScope {
    /// Individual holdings of an asset
    Holdings { targets: Vec<TargetAddress> },
    /// Every holding of an asset
    Asset { asset_code: AssetCode },
    /// Every asset of the contract
    Contract,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeRecord {
    /// Freeze response transaction; keys the holding statuses
    pub freeze_txid: TxId,
    #[serde(default)]
    pub asset_code: Option<AssetCode>,
    pub scope: FreezeScope,
    /// Zero for indefinite
    pub expires: Timestamp,
    pub created_at: Timestamp,
}

fn freeze_key(contract: &Address, freeze_txid: &TxId) -> String {
    format!("contracts/{}/freezes/{}", contract, freeze_txid)
}

#[derive(Clone)]
pub struct FreezeRepository {
    store: Arc<dyn Store>,
}

impl FreezeRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, contract: &Address, freeze_txid: &TxId) -> EnforcementResult<Option<FreezeRecord>> {
        Ok(get_json(self.store.as_ref(), &freeze_key(contract, freeze_txid)).await?)
    }

    pub async fn save(&self, contract: &Address, record: &FreezeRecord) -> EnforcementResult<()> {
        put_json(self.store.as_ref(), &freeze_key(contract, &record.freeze_txid), record).await?;
        Ok(())
    }

    pub async fn remove(&self, contract: &Address, freeze_txid: &TxId) -> EnforcementResult<bool> {
        Ok(self.store.remove(&freeze_key(contract, freeze_txid)).await?)
    }
}
