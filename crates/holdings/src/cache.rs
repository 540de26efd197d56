//! Holdings cache with asynchronous write-behind
//!
//! ```text
//! save() ──► in-memory map (visible immediately) ──► bounded queue ──► worker ──► Store
//!                                                     (when open)
//! ```
//!
//! Reads always go through the map first, so a saved holding is visible to
//! the next `get` whether or not the worker has flushed it. While the queue
//! is closed, `save` writes through to the store.

use crate::error::HoldingsResult;
use crate::holding::Holding;
use smartledger_core::{Address, AssetCode, Timestamp};
use smartledger_state::Asset;
use smartledger_storage::{get_json, put_json, Store};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HoldingKey {
    pub contract: Address,
    pub asset: AssetCode,
    pub address: Address,
}

impl HoldingKey {
    pub fn new(contract: Address, asset: AssetCode, address: Address) -> Self {
        Self {
            contract,
            asset,
            address,
        }
    }

    fn storage_key(&self) -> String {
        format!("{}/{}", asset_prefix(&self.contract, &self.asset), self.address)
    }
}

fn asset_prefix(contract: &Address, asset: &AssetCode) -> String {
    format!("contracts/{}/holdings/{}", contract, asset)
}

struct CacheEntry {
    holding: Holding,
    modified: bool,
}

type Entries = Arc<RwLock<HashMap<HoldingKey, CacheEntry>>>;

struct Worker {
    sender: mpsc::Sender<HoldingKey>,
    handle: JoinHandle<()>,
}

pub struct HoldingsCache {
    store: Arc<dyn Store>,
    entries: Entries,
    worker: Mutex<Option<Worker>>,
}

impl HoldingsCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            entries: Arc::new(RwLock::new(HashMap::new())),
            worker: Mutex::new(None),
        }
    }

    /// Start the write-behind worker with a queue of `capacity` entries
    pub async fn open(&self, capacity: usize) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }

        let (sender, mut receiver) = mpsc::channel::<HoldingKey>(capacity.max(1));
        let store = Arc::clone(&self.store);
        let entries = Arc::clone(&self.entries);
        let handle = tokio::spawn(async move {
            while let Some(key) = receiver.recv().await {
                if let Err(e) = write_entry(store.as_ref(), &entries, &key).await {
                    error!(contract = %key.contract, address = %key.address, "holding write failed: {}", e);
                }
            }
            debug!("holdings worker stopped");
        });

        debug!(capacity, "holdings worker started");
        *worker = Some(Worker { sender, handle });
    }

    /// Drain the queue, stop the worker and flush anything still modified
    pub async fn close(&self) -> HoldingsResult<()> {
        let worker = self.worker.lock().await.take();
        if let Some(Worker { sender, handle }) = worker {
            drop(sender);
            if let Err(e) = handle.await {
                error!("holdings worker panicked: {}", e);
            }
        }
        self.flush().await
    }

    pub async fn is_open(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Drop every cached holding without writing it
    pub async fn reset(&self) {
        self.entries.write().await.clear();
    }

    /// Write every modified holding now
    pub async fn flush(&self) -> HoldingsResult<()> {
        let keys: Vec<HoldingKey> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.modified)
            .map(|(key, _)| *key)
            .collect();
        for key in keys {
            write_entry(self.store.as_ref(), &self.entries, &key).await?;
        }
        Ok(())
    }

    /// Holding for an address, empty if it never held the asset
    pub async fn get(
        &self,
        contract: &Address,
        asset: &AssetCode,
        address: &Address,
        now: Timestamp,
    ) -> HoldingsResult<Holding> {
        let key = HoldingKey::new(*contract, *asset, *address);
        if let Some(entry) = self.entries.read().await.get(&key) {
            return Ok(entry.holding.clone());
        }

        let stored: Option<Holding> = get_json(self.store.as_ref(), &key.storage_key()).await?;
        match stored {
            Some(holding) => {
                self.entries.write().await.entry(key).or_insert(CacheEntry {
                    holding: holding.clone(),
                    modified: false,
                });
                Ok(holding)
            }
            None => Ok(Holding::new(*address, now)),
        }
    }

    /// Store a holding; visible to `get` as soon as this returns
    pub async fn save(&self, contract: &Address, asset: &AssetCode, holding: &Holding) -> HoldingsResult<()> {
        let key = HoldingKey::new(*contract, *asset, holding.address);
        self.entries.write().await.insert(
            key,
            CacheEntry {
                holding: holding.clone(),
                modified: true,
            },
        );

        let sender = self.worker.lock().await.as_ref().map(|w| w.sender.clone());
        match sender {
            Some(sender) if sender.send(key).await.is_ok() => Ok(()),
            _ => write_entry(self.store.as_ref(), &self.entries, &key).await,
        }
    }

    /// Every holding of an asset, cached or stored
    pub async fn list(&self, contract: &Address, asset: &AssetCode) -> HoldingsResult<Vec<Holding>> {
        let mut result: BTreeMap<Address, Holding> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.contract == *contract && key.asset == *asset)
            .map(|(key, entry)| (key.address, entry.holding.clone()))
            .collect();

        let prefix = format!("{}/", asset_prefix(contract, asset));
        for storage_key in self.store.list(&prefix).await? {
            let Some(holding) = get_json::<Holding>(self.store.as_ref(), &storage_key).await? else {
                continue;
            };
            result.entry(holding.address).or_insert(holding);
        }

        Ok(result.into_values().collect())
    }

    /// Add each holder's voting balance to `ballots`
    ///
    /// Uses finalized balances, scaled by the asset's vote multiplier when
    /// the voting system permits it. Assets without voting rights add nothing.
    pub async fn append_ballots(
        &self,
        contract: &Address,
        asset: &Asset,
        ballots: &mut BTreeMap<Address, u64>,
        apply_multiplier: bool,
    ) -> HoldingsResult<()> {
        if !asset.terms.voting_rights {
            return Ok(());
        }
        let weight = asset.vote_weight(apply_multiplier);
        for holding in self.list(contract, &asset.code).await? {
            let quantity = holding.finalized_balance.saturating_mul(weight);
            if quantity == 0 {
                continue;
            }
            let entry = ballots.entry(holding.address).or_insert(0);
            *entry = entry.saturating_add(quantity);
        }
        Ok(())
    }
}

async fn write_entry(store: &dyn Store, entries: &Entries, key: &HoldingKey) -> HoldingsResult<()> {
    let holding = {
        let mut guard = entries.write().await;
        match guard.get_mut(key) {
            Some(entry) if entry.modified => {
                entry.modified = false;
                entry.holding.clone()
            }
            _ => return Ok(()),
        }
    };

    if let Err(e) = put_json(store, &key.storage_key(), &holding).await {
        if let Some(entry) = entries.write().await.get_mut(key) {
            entry.modified = true;
        }
        return Err(e.into());
    }
    debug!(contract = %key.contract, address = %key.address, "holding written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartledger_storage::MemoryStore;

    fn key() -> (Address, AssetCode, Address) {
        (Address::new([1; 20]), AssetCode::new([2; 20]), Address::new([3; 20]))
    }

    #[tokio::test]
    async fn test_read_your_writes_while_open() {
        let store = Arc::new(MemoryStore::new());
        let cache = HoldingsCache::new(store.clone());
        cache.open(4).await;

        let (contract, asset, address) = key();
        let now = Timestamp::from_secs(1);
        let mut h = cache.get(&contract, &asset, &address, now).await.unwrap();
        assert_eq!(h.finalized_balance, 0);

        h.credit_finalized(500, now);
        cache.save(&contract, &asset, &h).await.unwrap();
        let again = cache.get(&contract, &asset, &address, now).await.unwrap();
        assert_eq!(again.finalized_balance, 500);

        cache.close().await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_write_through_when_closed() {
        let store = Arc::new(MemoryStore::new());
        let cache = HoldingsCache::new(store.clone());
        let (contract, asset, address) = key();
        let now = Timestamp::from_secs(1);

        let mut h = Holding::new(address, now);
        h.credit_finalized(7, now);
        cache.save(&contract, &asset, &h).await.unwrap();
        assert_eq!(store.len().await, 1);

        cache.reset().await;
        let loaded = cache.get(&contract, &asset, &address, now).await.unwrap();
        assert_eq!(loaded.finalized_balance, 7);
    }

    #[tokio::test]
    async fn test_reset_drops_unflushed_state() {
        let store = Arc::new(MemoryStore::new());
        let cache = HoldingsCache::new(store.clone());
        let (contract, asset, address) = key();
        let now = Timestamp::from_secs(1);

        let mut h = Holding::new(address, now);
        h.credit_finalized(10, now);
        cache.save(&contract, &asset, &h).await.unwrap();

        h.credit_finalized(5, now);
        cache.entries.write().await.insert(
            HoldingKey::new(contract, asset, address),
            CacheEntry {
                holding: h.clone(),
                modified: true,
            },
        );
        cache.reset().await;

        let loaded = cache.get(&contract, &asset, &address, now).await.unwrap();
        assert_eq!(loaded.finalized_balance, 10);
    }

    #[tokio::test]
    async fn test_list_merges_cache_and_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = HoldingsCache::new(store.clone());
        let (contract, asset, _) = key();
        let now = Timestamp::from_secs(1);

        for n in 1..=3u8 {
            let mut h = Holding::new(Address::new([n; 20]), now);
            h.credit_finalized(n as u64 * 10, now);
            cache.save(&contract, &asset, &h).await.unwrap();
        }
        cache.reset().await;

        let mut h = cache.get(&contract, &asset, &Address::new([1; 20]), now).await.unwrap();
        h.credit_finalized(1, now);
        cache.open(2).await;
        cache.save(&contract, &asset, &h).await.unwrap();

        let holdings = cache.list(&contract, &asset).await.unwrap();
        let balances: Vec<u64> = holdings.iter().map(|h| h.finalized_balance).collect();
        assert_eq!(balances, vec![11, 20, 30]);
        cache.close().await.unwrap();
    }
}
