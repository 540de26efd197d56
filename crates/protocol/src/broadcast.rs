//! Outbound transaction broadcast

use crate::error::ProtocolResult;
use crate::tx::Transaction;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Publishes response and message transactions to the network
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, tx: &Transaction) -> ProtocolResult<()>;
}

/// Collects broadcasts in memory for a test network or a CLI run
#[derive(Debug, Default, Clone)]
pub struct MemoryBroadcaster {
    sent: Arc<Mutex<Vec<Transaction>>>,
}

impl MemoryBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything broadcast so far
    pub async fn take(&self) -> Vec<Transaction> {
        std::mem::take(&mut *self.sent.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sent.lock().await.is_empty()
    }
}

#[async_trait]
impl Broadcaster for MemoryBroadcaster {
    async fn broadcast(&self, tx: &Transaction) -> ProtocolResult<()> {
        debug!(txid = %tx.txid, action = tx.action.name(), "broadcast");
        self.sent.lock().await.push(tx.clone());
        Ok(())
    }
}
