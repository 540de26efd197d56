//! Orders planned and committed against an in-memory ledger

use smartledger_core::{Address, RejectionCode, Timestamp, TxId};
use smartledger_enforcement::{EnforcementEngine, EnforcementPlan, FreezeRepository};
use smartledger_holdings::{Holding, HoldingsCache};
use smartledger_protocol::{Action, ComplianceAction, Order, QuantityIndex, TargetAddress};
use smartledger_state::{Asset, AssetTerms, Contract, ContractTerms, StateRepository};
use smartledger_storage::MemoryStore;
use std::sync::Arc;

const ADMIN: Address = Address::new([1; 20]);
const ALICE: Address = Address::new([2; 20]);
const BOB: Address = Address::new([3; 20]);
const VAULT: Address = Address::new([4; 20]);

struct Fixture {
    engine: EnforcementEngine,
    holdings: Arc<HoldingsCache>,
    state: StateRepository,
    contract: Contract,
    asset: Asset,
}

fn at(secs: u64) -> Timestamp {
    Timestamp::from_secs(secs)
}

async fn fixture(orders_permitted: bool) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let state = StateRepository::new(store.clone());
    let holdings = Arc::new(HoldingsCache::new(store.clone()));
    let engine = EnforcementEngine::new(holdings.clone(), state.clone(), FreezeRepository::new(store));

    let mut contract = Contract::new(Address::new([9; 20]), ContractTerms::new("Acme", ADMIN), at(1));
    let mut terms = AssetTerms::new("SHC", 1000);
    terms.enforcement_orders_permitted = orders_permitted;
    let asset = Asset::new(contract.address, 0, terms, at(1));
    contract.add_asset_code(asset.code);
    state.save_contract(&contract).await.unwrap();
    state.save_asset(&asset).await.unwrap();

    for (address, quantity) in [(ADMIN, 700), (ALICE, 200), (BOB, 100)] {
        let mut holding = Holding::new(address, at(1));
        holding.credit_finalized(quantity, at(1));
        holdings.save(&contract.address, &asset.code, &holding).await.unwrap();
    }

    Fixture {
        engine,
        holdings,
        state,
        contract,
        asset,
    }
}

fn order(action: ComplianceAction, asset: &Asset, targets: &[(Address, u64)]) -> Order {
    Order {
        compliance_action: action,
        asset_code: Some(asset.code),
        target_addresses: targets
            .iter()
            .map(|(address, quantity)| TargetAddress {
                address: *address,
                quantity: *quantity,
            })
            .collect(),
        freeze_txid: None,
        freeze_period: Timestamp::ZERO,
        deposit_address: None,
        authority: None,
        bitcoin_dispersions: vec![],
        message: String::new(),
    }
}

impl Fixture {
    async fn holding(&self, address: Address, now: Timestamp) -> Holding {
        self.holdings
            .get(&self.contract.address, &self.asset.code, &address, now)
            .await
            .unwrap()
    }

    async fn run(&mut self, order: &Order, txid: TxId, now: Timestamp) -> EnforcementPlan {
        let plan = self.engine.plan(&self.contract, order, &ADMIN, now).await.unwrap();
        self.engine.commit(&mut self.contract, &plan, txid, now).await.unwrap();
        plan
    }
}

#[tokio::test]
async fn test_freeze_then_thaw_restores_unfrozen_balance() {
    let mut f = fixture(true).await;
    let before = f.holding(ALICE, at(10)).await.unfrozen_balance(at(10));

    let freeze_txid = TxId::new([0xf1; 32]);
    let freeze = order(ComplianceAction::Freeze, &f.asset, &[(ALICE, 150)]);
    let plan = f.run(&freeze, freeze_txid, at(10)).await;
    assert_eq!(plan.recipients(), vec![(ALICE, 0)]);
    assert!(matches!(
        plan.action(at(10)),
        Action::Freeze(ref fr) if fr.quantities == vec![QuantityIndex::new(0, 150)]
    ));

    let frozen = f.holding(ALICE, at(11)).await;
    assert_eq!(frozen.finalized_balance, 200);
    assert_eq!(frozen.unfrozen_balance(at(11)), 50);

    let mut thaw = order(ComplianceAction::Thaw, &f.asset, &[]);
    thaw.freeze_txid = Some(freeze_txid);
    f.run(&thaw, TxId::new([0xf2; 32]), at(12)).await;
    assert_eq!(f.holding(ALICE, at(13)).await.unfrozen_balance(at(13)), before);

    let err = f.engine.plan(&f.contract, &thaw, &ADMIN, at(14)).await.unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::MsgMalformed);
}

#[tokio::test]
async fn test_freeze_expires_by_timestamp() {
    let mut f = fixture(true).await;
    let mut freeze = order(ComplianceAction::Freeze, &f.asset, &[(BOB, 100)]);
    freeze.freeze_period = at(50);
    f.run(&freeze, TxId::new([0xf3; 32]), at(10)).await;

    assert_eq!(f.holding(BOB, at(49)).await.unfrozen_balance(at(49)), 0);
    assert_eq!(f.holding(BOB, at(50)).await.unfrozen_balance(at(50)), 100);
}

#[tokio::test]
async fn test_whole_asset_freeze_and_thaw() {
    let mut f = fixture(true).await;
    let contract_address = f.contract.address;
    let freeze = order(ComplianceAction::Freeze, &f.asset, &[(contract_address, 0)]);
    let freeze_txid = TxId::new([0xf4; 32]);
    let plan = f.run(&freeze, freeze_txid, at(10)).await;
    assert!(plan.recipients().is_empty());

    let asset = f.state.fetch_asset(&f.contract, &f.asset.code).await.unwrap().unwrap();
    assert!(asset.is_frozen(at(1_000_000)));

    let mut thaw = order(ComplianceAction::Thaw, &f.asset, &[]);
    thaw.freeze_txid = Some(freeze_txid);
    f.run(&thaw, TxId::new([0xf5; 32]), at(20)).await;
    let asset = f.state.fetch_asset(&f.contract, &f.asset.code).await.unwrap().unwrap();
    assert!(!asset.is_frozen(at(21)));
}

#[tokio::test]
async fn test_whole_contract_freeze() {
    let mut f = fixture(true).await;
    let contract_address = f.contract.address;
    let mut freeze = order(ComplianceAction::Freeze, &f.asset, &[(contract_address, 0)]);
    freeze.asset_code = None;
    freeze.freeze_period = at(100);
    f.run(&freeze, TxId::new([0xf6; 32]), at(10)).await;

    assert!(f.contract.is_frozen(at(99)));
    let stored = f.state.fetch_contract(&contract_address).await.unwrap().unwrap();
    assert_eq!(stored.freeze_period, at(100));
}

#[tokio::test]
async fn test_confiscation_moves_finalized_balance() {
    let mut f = fixture(true).await;
    let mut confiscate = order(ComplianceAction::Confiscation, &f.asset, &[(ALICE, 150), (BOB, 100)]);
    confiscate.deposit_address = Some(VAULT);
    let plan = f.run(&confiscate, TxId::new([0xc1; 32]), at(10)).await;

    assert_eq!(plan.recipients(), vec![(ALICE, 0), (BOB, 0), (VAULT, 0)]);
    assert!(matches!(
        plan.action(at(10)),
        Action::Confiscation(ref c) if c.deposit_qty == 250
            && c.quantities == vec![QuantityIndex::new(0, 50), QuantityIndex::new(1, 0)]
    ));

    let alice = f.holding(ALICE, at(11)).await;
    assert_eq!((alice.pending_balance, alice.finalized_balance), (50, 50));
    assert_eq!(f.holding(VAULT, at(11)).await.finalized_balance, 250);
}

#[tokio::test]
async fn test_confiscation_beyond_balance_rejected() {
    let f = fixture(true).await;
    let mut confiscate = order(ComplianceAction::Confiscation, &f.asset, &[(BOB, 101)]);
    confiscate.deposit_address = Some(VAULT);
    let err = f.engine.plan(&f.contract, &confiscate, &ADMIN, at(10)).await.unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::InsufficientQuantity);
    assert_eq!(f.holding(BOB, at(10)).await.finalized_balance, 100);
}

#[tokio::test]
async fn test_reconciliation_pays_dispersions() {
    let mut f = fixture(true).await;
    let mut reconcile = order(ComplianceAction::Reconciliation, &f.asset, &[(ALICE, 200), (BOB, 40)]);
    reconcile.bitcoin_dispersions = vec![QuantityIndex::new(0, 5_000)];
    let plan = f.run(&reconcile, TxId::new([0xd1; 32]), at(10)).await;

    assert_eq!(plan.recipients(), vec![(ALICE, 5_000), (BOB, 0)]);
    assert_eq!(f.holding(ALICE, at(11)).await.finalized_balance, 0);
    assert_eq!(f.holding(BOB, at(11)).await.finalized_balance, 60);

    reconcile.bitcoin_dispersions = vec![QuantityIndex::new(2, 1)];
    let err = f.engine.plan(&f.contract, &reconcile, &ADMIN, at(12)).await.unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::MsgMalformed);
}

#[tokio::test]
async fn test_order_gates() {
    let f = fixture(false).await;
    let freeze = order(ComplianceAction::Freeze, &f.asset, &[(ALICE, 1)]);

    let err = f.engine.plan(&f.contract, &freeze, &ALICE, at(10)).await.unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::NotOperator);

    let err = f.engine.plan(&f.contract, &freeze, &ADMIN, at(10)).await.unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::AssetNotPermitted);

    let f = fixture(true).await;
    let duplicate = order(ComplianceAction::Freeze, &f.asset, &[(ALICE, 1), (ALICE, 2)]);
    let err = f.engine.plan(&f.contract, &duplicate, &ADMIN, at(10)).await.unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::MsgMalformed);
}
