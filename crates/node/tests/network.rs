//! Enforcement orders and transfers spanning two contract actors

mod common;

use common::*;
use smartledger_core::{Address, AssetCode, RejectionCode, Timestamp, TxId};
use smartledger_node::Handled;
use smartledger_protocol::{
    Action, AssetReceiver, AssetTransfer, ComplianceAction, Order, OutPoint, QuantityIndex, TargetAddress,
    Transaction, Transfer, TxInput, TxOutput,
};
use smartledger_settlement::Outcome;

fn send(contract_index: u32, asset: AssetCode, from: u32, to: Address, quantity: u64) -> AssetTransfer {
    AssetTransfer {
        contract_index,
        asset_code: asset,
        senders: vec![QuantityIndex::new(from, quantity)],
        receivers: vec![AssetReceiver { address: to, quantity }],
    }
}

fn transfer(assets: Vec<AssetTransfer>) -> Action {
    Action::Transfer(Transfer {
        assets,
        offer_expiry: Timestamp::ZERO,
    })
}

fn order(action: ComplianceAction, asset: AssetCode, targets: &[(Address, u64)]) -> Order {
    Order {
        compliance_action: action,
        asset_code: Some(asset),
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
        bitcoin_dispersions: Vec::new(),
        message: String::new(),
    }
}

#[tokio::test]
async fn test_freeze_blocks_transfer_until_thaw() {
    let mut net = Network::new(&[41]).await;
    net.form(0, contract_terms("Acme")).await;
    let asset = net.define(0, asset_terms(1_000)).await;
    let tx = net.request_to(ADMIN, 0, 2_000, transfer(vec![send(0, asset, 0, ALICE, 400)]));
    net.submit(&tx, at(3)).await;

    let freeze = Action::Order(order(ComplianceAction::Freeze, asset, &[(ALICE, 400)]));
    let tx = net.request_to(ADMIN, 0, FUNDING, freeze);
    let (handled, sent) = net.submit(&tx, at(5)).await;
    assert!(matches!(handled[0], Handled::Responded { ref action, .. } if action == "freeze"));
    assert_eq!(sent[0].value_to(&ALICE), 546);
    let freeze_txid = sent[0].txid;

    let blocked = net.request_to(ALICE, 0, 2_000, transfer(vec![send(0, asset, 0, BOB, 100)]));
    let (handled, _) = net.submit(&blocked, at(6)).await;
    assert!(matches!(
        handled[0],
        Handled::Transfer(Outcome::Rejected {
            code: RejectionCode::HoldingsFrozen,
            ..
        })
    ));

    let mut thaw = order(ComplianceAction::Thaw, asset, &[]);
    thaw.freeze_txid = Some(freeze_txid);
    let tx = net.request_to(ADMIN, 0, FUNDING, Action::Order(thaw));
    let (handled, _) = net.submit(&tx, at(7)).await;
    assert!(matches!(handled[0], Handled::Responded { ref action, .. } if action == "thaw"));

    let retry = net.request_to(ALICE, 0, 2_000, transfer(vec![send(0, asset, 0, BOB, 100)]));
    net.submit(&retry, at(8)).await;
    assert_eq!(net.holding(0, &asset, ALICE).await.finalized_balance, 300);
    assert_eq!(net.holding(0, &asset, BOB).await.finalized_balance, 100);
}

#[tokio::test]
async fn test_order_from_holder_rejected() {
    let mut net = Network::new(&[41]).await;
    net.form(0, contract_terms("Acme")).await;
    let asset = net.define(0, asset_terms(1_000)).await;

    let freeze = Action::Order(order(ComplianceAction::Freeze, asset, &[(ADMIN, 10)]));
    let tx = net.request_to(ALICE, 0, FUNDING, freeze);
    let (handled, _) = net.submit(&tx, at(5)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::NotOperator,
            ..
        }
    ));
}

/// Two formed contracts, each with one asset; BOB holds 300 of the second
async fn two_contracts() -> (Network, AssetCode, AssetCode) {
    let mut net = Network::new(&[51, 52]).await;
    net.form(0, contract_terms("First")).await;
    net.form(1, contract_terms("Second")).await;
    let first = net.define(0, asset_terms(1_000)).await;
    let second = net.define(1, asset_terms(1_000)).await;

    let tx = net.request_to(ADMIN, 1, 2_000, transfer(vec![send(0, second, 0, BOB, 300)]));
    net.submit(&tx, at(3)).await;
    assert_eq!(net.holding(1, &second, BOB).await.finalized_balance, 300);
    (net, first, second)
}

/// ADMIN sends 100 of the first asset to BOB, BOB sends `bob_sends` of the
/// second back; the first contract is paid twice for the boomerang
fn swap(net: &Network, first: AssetCode, second: AssetCode, bob_sends: u64) -> Transaction {
    Transaction::new(
        vec![
            TxInput::new(OutPoint::new(TxId::new([0xaa; 32]), 0), ADMIN, 10_000),
            TxInput::new(OutPoint::new(TxId::new([0xaa; 32]), 1), BOB, 10_000),
        ],
        vec![
            TxOutput::new(net.address(0), 2_000),
            TxOutput::new(net.address(1), 1_000),
            TxOutput::new(net.address(0), 3_000),
        ],
        transfer(vec![
            send(0, first, 0, BOB, 100),
            send(1, second, 1, ADMIN, bob_sends),
        ]),
    )
    .unwrap()
}

#[tokio::test]
async fn test_two_contract_swap_settles() {
    let (mut net, first, second) = two_contracts().await;
    let tx = swap(&net, first, second, 50);

    let (handled, sent) = net.submit(&tx, at(10)).await;
    assert!(matches!(handled[0], Handled::Transfer(Outcome::Sent { .. })));
    assert_eq!(handled[1], Handled::Transfer(Outcome::Ignored));
    let names: Vec<&str> = sent.iter().map(|t| t.action.name()).collect();
    assert_eq!(names, vec!["message", "message", "settlement"]);
    assert!(sent[2].is_fully_signed());

    let admin = net.holding(0, &first, ADMIN).await;
    assert_eq!((admin.finalized_balance, admin.is_locked()), (900, false));
    assert_eq!(net.holding(0, &first, BOB).await.finalized_balance, 100);
    assert_eq!(net.holding(1, &second, BOB).await.finalized_balance, 250);
    assert_eq!(net.holding(1, &second, ADMIN).await.finalized_balance, 750);
    assert!(net.scheduler.pending().await.is_empty());
}

#[tokio::test]
async fn test_two_contract_swap_rejected_by_peer_restores_holdings() {
    let (mut net, first, second) = two_contracts().await;
    let tx = swap(&net, first, second, 500);

    let (_, sent) = net.submit(&tx, at(10)).await;
    let codes: Vec<RejectionCode> = sent
        .iter()
        .filter_map(|t| match &t.action {
            Action::Rejection(r) => Some(r.code),
            _ => None,
        })
        .collect();
    assert_eq!(codes.last(), Some(&RejectionCode::InsufficientQuantity));

    let admin = net.holding(0, &first, ADMIN).await;
    assert_eq!((admin.pending_balance, admin.finalized_balance), (1_000, 1_000));
    assert!(!admin.is_locked());
    assert_eq!(net.holding(1, &second, BOB).await.pending_balance, 300);
    assert!(net.scheduler.pending().await.is_empty());
    assert!(net.actors[0]
        .orchestrator()
        .pending()
        .list(&net.address(0))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unanswered_swap_times_out() {
    let (mut net, first, second) = two_contracts().await;
    let tx = swap(&net, first, second, 50);

    // Only the first contract sees the request; its message is lost
    let handled = net.actors[0].handle(&tx, at(10)).await.unwrap();
    assert!(matches!(handled, Handled::Transfer(Outcome::Sent { .. })));
    net.broadcaster.take().await;

    assert!(net.advance(at(69)).await.0.is_empty());
    let (handled, sent) = net.advance(at(70)).await;
    assert!(matches!(
        handled[0],
        Handled::Transfer(Outcome::Rejected {
            code: RejectionCode::Timeout,
            ..
        })
    ));
    assert!(matches!(&sent[0].action, Action::Rejection(r) if r.code == RejectionCode::Timeout));
    assert_eq!(net.holding(0, &first, ADMIN).await.pending_balance, 1_000);
}
