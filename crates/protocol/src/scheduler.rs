//! Deferred callbacks
//!
//! Transfer timeouts and vote expiry run as scheduled jobs. The scheduler
//! only records jobs; whoever drives it hands due jobs back to the owning
//! contract actor.

use crate::error::ProtocolResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, Timestamp, TxId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Cancel a multi-contract transfer that never completed
    TransferTimeout { transfer_txid: TxId },
    /// Tally a vote at its cutoff
    VoteFinalizer { vote_txid: TxId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub contract: Address,
    pub run_at: Timestamp,
    pub kind: JobKind,
}

impl Job {
    pub fn new(contract: Address, run_at: Timestamp, kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            contract,
            run_at,
            kind,
        }
    }
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, job: Job) -> ProtocolResult<()>;

    /// Returns whether the job was still pending
    async fn cancel(&self, job_id: &str) -> ProtocolResult<bool>;
}

/// Scheduler driven explicitly by the caller's clock
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    jobs: Arc<Mutex<BTreeMap<String, Job>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return jobs due at `now`, earliest first
    pub async fn due(&self, now: Timestamp) -> Vec<Job> {
        let mut jobs = self.jobs.lock().await;
        let due_ids: Vec<String> = jobs
            .values()
            .filter(|job| job.run_at <= now)
            .map(|job| job.id.clone())
            .collect();
        let mut due: Vec<Job> = due_ids.iter().filter_map(|id| jobs.remove(id)).collect();
        due.sort_by_key(|job| job.run_at);
        due
    }

    pub async fn pending(&self) -> Vec<Job> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// Earliest pending run time
    pub async fn next_run(&self) -> Option<Timestamp> {
        self.jobs.lock().await.values().map(|job| job.run_at).min()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    async fn schedule(&self, job: Job) -> ProtocolResult<()> {
        debug!(job_id = %job.id, run_at = %job.run_at, "job scheduled");
        self.jobs.lock().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> ProtocolResult<bool> {
        let removed = self.jobs.lock().await.remove(job_id).is_some();
        debug!(job_id, removed, "job cancelled");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_due_and_cancel() {
        let scheduler = ManualScheduler::new();
        let contract = Address::new([1; 20]);
        let early = Job::new(
            contract,
            Timestamp::from_secs(10),
            JobKind::TransferTimeout {
                transfer_txid: TxId::new([1; 32]),
            },
        );
        let late = Job::new(
            contract,
            Timestamp::from_secs(20),
            JobKind::VoteFinalizer {
                vote_txid: TxId::new([2; 32]),
            },
        );
        scheduler.schedule(early.clone()).await.unwrap();
        scheduler.schedule(late.clone()).await.unwrap();

        assert_eq!(scheduler.next_run().await, Some(Timestamp::from_secs(10)));
        assert!(scheduler.due(Timestamp::from_secs(5)).await.is_empty());
        assert_eq!(scheduler.due(Timestamp::from_secs(15)).await, vec![early.clone()]);

        assert!(!scheduler.cancel(&early.id).await.unwrap());
        assert!(scheduler.cancel(&late.id).await.unwrap());
        assert!(scheduler.pending().await.is_empty());
    }
}
