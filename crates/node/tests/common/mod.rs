//! In-memory network of contract actors

#![allow(dead_code)]

use rust_decimal_macros::dec;
use smartledger_core::{Address, AssetCode, ContractKey, Timestamp, TxId};
use smartledger_holdings::Holding;
use smartledger_node::{ContractActor, Handled, NodeConfig};
use smartledger_permissions::{Permission, PermissionTable};
use smartledger_protocol::{
    Action, AssetDefinition, ContractOffer, ManualScheduler, MemoryBroadcaster, OutPoint, Transaction, TxInput,
    TxOutput,
};
use smartledger_state::{AssetTerms, ContractTerms, VoteType, VotingSystem};
use smartledger_storage::MemoryStore;
use std::sync::Arc;

pub const ADMIN: Address = Address::new([1; 20]);
pub const ALICE: Address = Address::new([2; 20]);
pub const BOB: Address = Address::new([3; 20]);

/// Funding paid to a contract by well-funded requests
pub const FUNDING: u64 = 5_000;

pub fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

/// Terms with one majority voting system; every field is amendable both
/// directly and by proposal
pub fn contract_terms(name: &str) -> ContractTerms {
    let mut terms = ContractTerms::new(name, ADMIN);
    terms.voting_systems = vec![VotingSystem::new("Majority", VoteType::Relative, dec!(50))];
    terms.permissions = PermissionTable::new(vec![Permission {
        permitted: true,
        ..Permission::by_proposal(1)
    }]);
    terms.administration_proposal = true;
    terms.holder_proposal = true;
    terms
}

pub fn asset_terms(quantity: u64) -> AssetTerms {
    let mut terms = AssetTerms::new("SHC", quantity);
    terms.voting_rights = true;
    terms.enforcement_orders_permitted = true;
    terms.administration_proposal = true;
    terms.holder_proposal = true;
    terms.permissions = PermissionTable::new(vec![Permission {
        permitted: true,
        ..Permission::by_proposal(1)
    }]);
    terms
}

pub struct Network {
    pub actors: Vec<ContractActor>,
    pub broadcaster: MemoryBroadcaster,
    pub scheduler: ManualScheduler,
    requests: u32,
}

impl Network {
    pub async fn new(seeds: &[u8]) -> Self {
        let broadcaster = MemoryBroadcaster::new();
        let scheduler = ManualScheduler::new();
        let mut actors = Vec::new();
        for seed in seeds {
            let actor = ContractActor::open(
                ContractKey::from_seed([*seed; 32]),
                NodeConfig::default(),
                Arc::new(MemoryStore::new()),
                Arc::new(broadcaster.clone()),
                Arc::new(scheduler.clone()),
            )
            .await
            .unwrap();
            actors.push(actor);
        }
        Self {
            actors,
            broadcaster,
            scheduler,
            requests: 0,
        }
    }

    pub fn address(&self, contract: usize) -> Address {
        *self.actors[contract].address()
    }

    /// A request spending a fresh output of `from`
    pub fn request(&mut self, from: Address, outputs: Vec<TxOutput>, action: Action) -> Transaction {
        self.requests += 1;
        let mut funding = [0u8; 32];
        funding[..4].copy_from_slice(&self.requests.to_be_bytes());
        Transaction::new(
            vec![TxInput::new(OutPoint::new(TxId::new(funding), 0), from, 100_000)],
            outputs,
            action,
        )
        .unwrap()
    }

    /// A request paying `value` to one contract
    pub fn request_to(&mut self, from: Address, contract: usize, value: u64, action: Action) -> Transaction {
        let outputs = vec![TxOutput::new(self.address(contract), value)];
        self.request(from, outputs, action)
    }

    /// Deliver `tx` and everything it causes until the network is quiet
    ///
    /// Returns how each actor handled `tx` itself and every broadcast.
    pub async fn submit(&mut self, tx: &Transaction, now: Timestamp) -> (Vec<Handled>, Vec<Transaction>) {
        let mut handled = Vec::new();
        for actor in self.actors.iter_mut() {
            if tx.touches(actor.address()) {
                handled.push(actor.handle(tx, now).await.unwrap());
            }
        }
        let sent = self.settle(now).await;
        (handled, sent)
    }

    /// Route broadcasts to every actor they touch until none are left
    pub async fn settle(&mut self, now: Timestamp) -> Vec<Transaction> {
        let mut seen = Vec::new();
        loop {
            let outbox = self.broadcaster.take().await;
            if outbox.is_empty() {
                return seen;
            }
            for tx in outbox {
                for actor in self.actors.iter_mut() {
                    if tx.touches(actor.address()) {
                        actor.handle(&tx, now).await.unwrap();
                    }
                }
                seen.push(tx);
            }
        }
    }

    /// Run every job due at `now`, then settle
    pub async fn advance(&mut self, now: Timestamp) -> (Vec<Handled>, Vec<Transaction>) {
        let mut handled = Vec::new();
        for job in self.scheduler.due(now).await {
            for actor in self.actors.iter_mut() {
                if *actor.address() == job.contract {
                    handled.push(actor.run_job(&job, now).await.unwrap());
                }
            }
        }
        let sent = self.settle(now).await;
        (handled, sent)
    }

    pub async fn holding(&self, contract: usize, asset: &AssetCode, address: Address) -> Holding {
        let actor = &self.actors[contract];
        actor
            .holdings()
            .get(actor.address(), asset, &address, at(1))
            .await
            .unwrap()
    }

    /// Form a contract administered by ADMIN
    pub async fn form(&mut self, contract: usize, terms: ContractTerms) {
        let offer = Action::ContractOffer(ContractOffer { terms });
        let tx = self.request_to(ADMIN, contract, FUNDING, offer);
        let (handled, _) = self.submit(&tx, at(1)).await;
        assert!(matches!(handled[0], Handled::Responded { .. }), "{:?}", handled);
    }

    /// Define an asset and return its code
    pub async fn define(&mut self, contract: usize, terms: AssetTerms) -> AssetCode {
        let definition = Action::AssetDefinition(AssetDefinition { terms });
        let tx = self.request_to(ADMIN, contract, FUNDING, definition);
        let (_, sent) = self.submit(&tx, at(2)).await;
        match &sent[0].action {
            Action::AssetCreation(creation) => creation.asset.code,
            other => panic!("unexpected response {:?}", other),
        }
    }
}
