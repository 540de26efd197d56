//! Contract, asset and agreement requests through one actor

mod common;

use common::*;
use smartledger_core::{RejectionCode, Timestamp};
use smartledger_node::Handled;
use smartledger_permissions::{AmendmentField, Permission, PermissionTable};
use smartledger_protocol::{
    Action, AgreementAmendment, AgreementOffer, AssetModification, AssetReceiver, AssetTransfer, ContractAmendment,
    ContractOffer, QuantityIndex, Transfer,
};
use smartledger_settlement::Outcome;
use smartledger_state::{AgreementTerms, Chapter};

fn transfer(asset: smartledger_core::AssetCode, to: smartledger_core::Address, quantity: u64) -> Action {
    Action::Transfer(Transfer {
        assets: vec![AssetTransfer {
            contract_index: 0,
            asset_code: asset,
            senders: vec![QuantityIndex::new(0, quantity)],
            receivers: vec![AssetReceiver { address: to, quantity }],
        }],
        offer_expiry: Timestamp::ZERO,
    })
}

fn rename(revision: u32, name: &str) -> Action {
    Action::ContractAmendment(ContractAmendment {
        contract_revision: revision,
        amendments: vec![AmendmentField::modify(vec![1], &name).unwrap()],
        ref_txid: None,
    })
}

#[tokio::test]
async fn test_offer_forms_contract_once() {
    let mut net = Network::new(&[11]).await;
    net.form(0, contract_terms("Acme")).await;

    let contract = net.actors[0].state().fetch_contract(&net.address(0)).await.unwrap().unwrap();
    assert_eq!(contract.terms.name, "Acme");
    assert_eq!(contract.revision, 0);

    let again = Action::ContractOffer(ContractOffer {
        terms: contract_terms("Other"),
    });
    let tx = net.request_to(ADMIN, 0, FUNDING, again);
    let (handled, sent) = net.submit(&tx, at(5)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::ContractExists,
            ..
        }
    ));
    assert_eq!(sent[0].value_to(&ADMIN), FUNDING - 200);
}

#[tokio::test]
async fn test_offer_from_stranger_rejected() {
    let mut net = Network::new(&[11]).await;
    let offer = Action::ContractOffer(ContractOffer {
        terms: contract_terms("Acme"),
    });
    let tx = net.request_to(BOB, 0, FUNDING, offer);
    let (handled, _) = net.submit(&tx, at(1)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::UnauthorizedAddress,
            ..
        }
    ));
    assert!(net.actors[0].state().fetch_contract(&net.address(0)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_requests_before_formation_rejected() {
    let mut net = Network::new(&[11]).await;
    let tx = net.request_to(ADMIN, 0, FUNDING, rename(0, "Acme"));
    let (handled, _) = net.submit(&tx, at(1)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::ContractDoesNotExist,
            ..
        }
    ));
}

#[tokio::test]
async fn test_amendment_revision_mismatch_leaves_contract_unchanged() {
    let mut net = Network::new(&[11]).await;
    net.form(0, contract_terms("Acme")).await;

    let tx = net.request_to(ADMIN, 0, FUNDING, rename(0, "Acme Holdings"));
    let (handled, _) = net.submit(&tx, at(5)).await;
    assert!(matches!(handled[0], Handled::Responded { ref action, .. } if action == "contract_formation"));

    let stale = net.request_to(ADMIN, 0, FUNDING, rename(0, "Acme Stale"));
    let (handled, _) = net.submit(&stale, at(6)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::MsgMalformed,
            ..
        }
    ));

    let contract = net.actors[0].state().fetch_contract(&net.address(0)).await.unwrap().unwrap();
    assert_eq!(contract.revision, 1);
    assert_eq!(contract.terms.name, "Acme Holdings");
}

#[tokio::test]
async fn test_amendment_by_holder_rejected() {
    let mut net = Network::new(&[11]).await;
    net.form(0, contract_terms("Acme")).await;

    let tx = net.request_to(ALICE, 0, FUNDING, rename(0, "Mine"));
    let (handled, _) = net.submit(&tx, at(5)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::NotOperator,
            ..
        }
    ));
}

#[tokio::test]
async fn test_underfunded_request_is_silent_and_changes_nothing() {
    let mut net = Network::new(&[11]).await;
    net.form(0, contract_terms("Acme")).await;

    let tx = net.request_to(ADMIN, 0, 400, rename(0, "Cheap"));
    let (handled, sent) = net.submit(&tx, at(5)).await;
    assert_eq!(
        handled,
        vec![Handled::Silent {
            code: RejectionCode::InsufficientTxFeeFunding
        }]
    );
    assert!(sent.is_empty());
    let contract = net.actors[0].state().fetch_contract(&net.address(0)).await.unwrap().unwrap();
    assert_eq!(contract.revision, 0);
}

#[tokio::test]
async fn test_transfer_funding_gate_then_settlement() {
    let mut net = Network::new(&[11]).await;
    net.form(0, contract_terms("Acme")).await;
    let asset = net.define(0, asset_terms(1_000)).await;
    assert_eq!(net.holding(0, &asset, ADMIN).await.finalized_balance, 1_000);

    let tx = net.request_to(ADMIN, 0, 600, transfer(asset, BOB, 750));
    let (handled, sent) = net.submit(&tx, at(10)).await;
    assert_eq!(
        handled,
        vec![Handled::Transfer(Outcome::Silent {
            code: RejectionCode::InsufficientTxFeeFunding
        })]
    );
    assert!(sent.is_empty());
    assert_eq!(net.holding(0, &asset, ADMIN).await.pending_balance, 1_000);

    let tx = net.request_to(ADMIN, 0, 2_000, transfer(asset, BOB, 750));
    let (_, sent) = net.submit(&tx, at(11)).await;
    let Action::Settlement(settlement) = &sent[0].action else {
        panic!("unexpected response {:?}", sent[0].action);
    };
    let mut quantities: Vec<u64> = settlement.assets[0].settlements.iter().map(|q| q.quantity).collect();
    quantities.sort();
    assert_eq!(quantities, vec![250, 750]);

    let admin = net.holding(0, &asset, ADMIN).await;
    assert_eq!((admin.pending_balance, admin.finalized_balance), (250, 250));
    assert_eq!(net.holding(0, &asset, BOB).await.finalized_balance, 750);
}

#[tokio::test]
async fn test_asset_quantity_changes_adjust_administration() {
    let mut net = Network::new(&[11]).await;
    net.form(0, contract_terms("Acme")).await;
    let asset = net.define(0, asset_terms(1_000)).await;

    let modify = |revision: u32, quantity: u64| {
        Action::AssetModification(AssetModification {
            asset_code: asset,
            asset_revision: revision,
            amendments: vec![AmendmentField::modify(vec![3], &quantity).unwrap()],
            ref_txid: None,
        })
    };

    let tx = net.request_to(ADMIN, 0, FUNDING, modify(0, 1_500));
    let (handled, _) = net.submit(&tx, at(5)).await;
    assert!(matches!(handled[0], Handled::Responded { .. }));
    assert_eq!(net.holding(0, &asset, ADMIN).await.finalized_balance, 1_500);

    let tx = net.request_to(ADMIN, 0, 2_000, transfer(asset, BOB, 1_200));
    net.submit(&tx, at(6)).await;
    assert_eq!(net.holding(0, &asset, ADMIN).await.finalized_balance, 300);

    // The administration holds 300 and cannot absorb a reduction of 1000
    let tx = net.request_to(ADMIN, 0, FUNDING, modify(1, 500));
    let (handled, _) = net.submit(&tx, at(7)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::InsufficientQuantity,
            ..
        }
    ));

    let tx = net.request_to(ADMIN, 0, FUNDING, modify(1, 1_300));
    let (handled, _) = net.submit(&tx, at(8)).await;
    assert!(matches!(handled[0], Handled::Responded { .. }));
    assert_eq!(net.holding(0, &asset, ADMIN).await.finalized_balance, 100);

    let contract = net.actors[0].state().fetch_contract(&net.address(0)).await.unwrap().unwrap();
    let stored = net.actors[0].state().fetch_asset(&contract, &asset).await.unwrap().unwrap();
    assert_eq!((stored.revision, stored.terms.authorized_token_qty), (2, 1_300));
}

#[tokio::test]
async fn test_asset_limit_enforced() {
    let mut net = Network::new(&[11]).await;
    let mut terms = contract_terms("Acme");
    terms.restricted_qty_assets = 1;
    net.form(0, terms).await;
    net.define(0, asset_terms(10)).await;

    let definition = Action::AssetDefinition(smartledger_protocol::AssetDefinition {
        terms: asset_terms(20),
    });
    let tx = net.request_to(ADMIN, 0, FUNDING, definition);
    let (handled, _) = net.submit(&tx, at(3)).await;
    assert!(matches!(handled[0], Handled::Rejected { .. }));

    let contract = net.actors[0].state().fetch_contract(&net.address(0)).await.unwrap().unwrap();
    assert_eq!(contract.asset_codes.len(), 1);
}

#[tokio::test]
async fn test_agreement_offer_and_amendment() {
    let mut net = Network::new(&[11]).await;
    net.form(0, contract_terms("Acme")).await;

    let terms = AgreementTerms {
        chapters: vec![Chapter {
            title: "Purpose".to_string(),
            preamble: String::new(),
            articles: Vec::new(),
        }],
        definitions: Vec::new(),
        permissions: PermissionTable::new(vec![Permission::permitted(1)]),
    };
    let offer = Action::AgreementOffer(AgreementOffer { terms: terms.clone() });
    let tx = net.request_to(ADMIN, 0, FUNDING, offer.clone());
    let (handled, _) = net.submit(&tx, at(3)).await;
    assert!(matches!(handled[0], Handled::Responded { ref action, .. } if action == "agreement_formation"));

    let tx = net.request_to(ADMIN, 0, FUNDING, offer);
    let (handled, _) = net.submit(&tx, at(4)).await;
    assert!(matches!(
        handled[0],
        Handled::Rejected {
            code: RejectionCode::AgreementExists,
            ..
        }
    ));

    let amendment = Action::AgreementAmendment(AgreementAmendment {
        agreement_revision: 0,
        amendments: vec![AmendmentField::modify(vec![1, 0, 1], &"Scope").unwrap()],
        ref_txid: None,
    });
    let tx = net.request_to(ADMIN, 0, FUNDING, amendment);
    let (handled, _) = net.submit(&tx, at(5)).await;
    assert!(matches!(handled[0], Handled::Responded { .. }));

    let agreement = net.actors[0].state().fetch_agreement(&net.address(0)).await.unwrap().unwrap();
    assert_eq!(agreement.revision, 1);
    assert_eq!(agreement.terms.chapters[0].title, "Scope");
}
