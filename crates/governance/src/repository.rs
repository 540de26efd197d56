//! Vote persistence

use crate::error::GovernanceResult;
use crate::vote::Vote;
use smartledger_core::{Address, TxId};
use smartledger_storage::{get_json, put_json, Store};
use std::sync::Arc;

fn votes_prefix(contract: &Address) -> String {
    format!("contracts/{}/votes/", contract)
}

fn vote_key(contract: &Address, vote_txid: &TxId) -> String {
    format!("{}{}", votes_prefix(contract), vote_txid)
}

#[derive(Clone)]
pub struct VoteRepository {
    store: Arc<dyn Store>,
}

impl VoteRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, contract: &Address, vote_txid: &TxId) -> GovernanceResult<Option<Vote>> {
        Ok(get_json(self.store.as_ref(), &vote_key(contract, vote_txid)).await?)
    }

    pub async fn save(&self, contract: &Address, vote: &Vote) -> GovernanceResult<()> {
        put_json(self.store.as_ref(), &vote_key(contract, &vote.vote_txid), vote).await?;
        Ok(())
    }

    /// Every vote of a contract, oldest first
    pub async fn list(&self, contract: &Address) -> GovernanceResult<Vec<Vote>> {
        let mut votes = Vec::new();
        for key in self.store.list(&votes_prefix(contract)).await? {
            if let Some(vote) = get_json::<Vote>(self.store.as_ref(), &key).await? {
                votes.push(vote);
            }
        }
        votes.sort_by_key(|v| v.created_at);
        Ok(votes)
    }
}
