//! Node context - wires one contract actor to a data directory

use crate::actor::ContractActor;
use crate::config::NodeConfig;
use smartledger_core::ContractKey;
use smartledger_protocol::{Job, ManualScheduler, MemoryBroadcaster, Scheduler};
use smartledger_storage::FileStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Environment variable holding the contract key seed (hex)
pub const KEY_ENV: &str = "SMARTLEDGER_CONTRACT_KEY";

const JOBS_FILE: &str = "jobs.json";

pub struct NodeContext {
    pub actor: ContractActor,
    pub broadcaster: MemoryBroadcaster,
    pub scheduler: ManualScheduler,
    contract_path: PathBuf,
}

impl NodeContext {
    /// Open the contract stored under `data_path/<address>`
    ///
    /// Jobs left pending by an earlier run are scheduled again.
    pub async fn new(data_path: impl AsRef<Path>, key: ContractKey, config: NodeConfig) -> Result<Self, anyhow::Error> {
        let contract_path = data_path.as_ref().join(key.address().to_string());
        let store = Arc::new(FileStore::new(&contract_path).await?);
        let broadcaster = MemoryBroadcaster::new();
        let scheduler = ManualScheduler::new();

        let jobs_path = contract_path.join(JOBS_FILE);
        if jobs_path.exists() {
            let jobs: Vec<Job> = serde_json::from_str(&std::fs::read_to_string(&jobs_path)?)?;
            for job in jobs {
                scheduler.schedule(job).await?;
            }
        }

        let actor = ContractActor::open(
            key,
            config,
            store,
            Arc::new(broadcaster.clone()),
            Arc::new(scheduler.clone()),
        )
        .await?;

        Ok(Self {
            actor,
            broadcaster,
            scheduler,
            contract_path,
        })
    }

    /// Persist pending jobs and flush holdings
    pub async fn close(&self) -> Result<(), anyhow::Error> {
        let jobs = self.scheduler.pending().await;
        std::fs::write(self.contract_path.join(JOBS_FILE), serde_json::to_string_pretty(&jobs)?)?;
        self.actor.close().await?;
        info!(jobs = jobs.len(), "node context closed");
        Ok(())
    }
}

/// Contract key from the environment, or from a seed file
pub fn load_key(key_file: Option<&Path>) -> Result<ContractKey, anyhow::Error> {
    if let Ok(seed) = std::env::var(KEY_ENV) {
        return Ok(ContractKey::from_hex(seed.trim())?);
    }
    match key_file {
        Some(path) => Ok(ContractKey::from_hex(std::fs::read_to_string(path)?.trim())?),
        None => anyhow::bail!("no contract key: set {} or pass --key-file", KEY_ENV),
    }
}
