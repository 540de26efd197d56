//! Proposal checks and ballot snapshots against stored state and holdings

use rust_decimal_macros::dec;
use smartledger_core::{Address, RejectionCode, Timestamp, TxId};
use smartledger_governance::{
    check_conflicts, snapshot_ballots, validate_proposal, ProposalScope, Vote, VoteRepository,
};
use smartledger_holdings::{Holding, HoldingsCache};
use smartledger_permissions::{AmendmentField, Permission, PermissionTable, ProposalType};
use smartledger_protocol::Proposal;
use smartledger_state::{
    Asset, AssetTerms, Contract, ContractTerms, StateRepository, VoteType, VotingSystem,
    ADMINISTRATOR_CLASS, MEMBERSHIP_TYPE,
};
use smartledger_storage::MemoryStore;
use std::sync::Arc;

const ADMIN: Address = Address::new([1; 20]);
const HOLDER: Address = Address::new([2; 20]);
const OUTSIDER: Address = Address::new([3; 20]);

struct Fixture {
    state: StateRepository,
    holdings: HoldingsCache,
    votes: VoteRepository,
    contract: Contract,
    shares: Asset,
}

fn now() -> Timestamp {
    Timestamp::from_secs(1_000)
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let state = StateRepository::new(store.clone());
    let holdings = HoldingsCache::new(store.clone());
    let votes = VoteRepository::new(store);

    let mut terms = ContractTerms::new("Acme", ADMIN);
    terms.voting_systems = vec![
        VotingSystem::new("Majority", VoteType::Relative, dec!(50)),
        VotingSystem::new("Plurality", VoteType::Plurality, dec!(1)),
    ];
    terms.permissions = PermissionTable::new(vec![Permission::by_proposal(2)]);
    terms.administration_proposal = true;
    terms.holder_proposal = true;
    let mut contract = Contract::new(Address::new([9; 20]), terms, now());

    let mut share_terms = AssetTerms::new("SHC", 1000);
    share_terms.voting_rights = true;
    share_terms.permissions = PermissionTable::new(vec![Permission::by_proposal(2)]);
    share_terms.holder_proposal = true;
    let shares = Asset::new(contract.address, 0, share_terms, now()).with_voting_systems(2);

    let mut member_terms = AssetTerms::new(MEMBERSHIP_TYPE, 1);
    member_terms.voting_rights = true;
    member_terms.payload = serde_json::json!({ "membership_class": ADMINISTRATOR_CLASS });
    let members = Asset::new(contract.address, 1, member_terms, now()).with_voting_systems(2);

    contract.add_asset_code(shares.code);
    contract.add_asset_code(members.code);
    contract.admin_member_asset = Some(members.code);
    state.save_contract(&contract).await.unwrap();
    state.save_asset(&shares).await.unwrap();
    state.save_asset(&members).await.unwrap();

    for (asset, address, quantity) in [
        (&shares, ADMIN, 700),
        (&shares, HOLDER, 300),
        (&members, ADMIN, 1),
    ] {
        let mut holding = Holding::new(address, now());
        holding.credit_finalized(quantity, now());
        holdings.save(&contract.address, &asset.code, &holding).await.unwrap();
    }

    Fixture {
        state,
        holdings,
        votes,
        contract,
        shares,
    }
}

fn proposal(proposal_type: ProposalType, amendments: Vec<AmendmentField>) -> Proposal {
    Proposal {
        proposal_type,
        asset_code: None,
        amends_agreement: false,
        vote_system: 0,
        proposed_amendments: amendments,
        vote_options: "AB".to_string(),
        vote_max: 1,
        vote_cutoff: Timestamp::from_secs(2_000),
        description: "Rename the contract".to_string(),
    }
}

fn rename() -> AmendmentField {
    AmendmentField::modify(vec![1u32], &"Acme Holdings").unwrap()
}

#[tokio::test]
async fn test_snapshot_scopes() {
    let f = fixture().await;

    let holder = proposal(ProposalType::Holder, vec![]);
    let ballots = snapshot_ballots(&f.holdings, &f.state, &f.contract, &holder).await.unwrap();
    assert_eq!(ballots.get(&ADMIN), Some(&700));
    assert_eq!(ballots.get(&HOLDER), Some(&300));

    let matter = proposal(ProposalType::AdministrativeMatter, vec![]);
    let ballots = snapshot_ballots(&f.holdings, &f.state, &f.contract, &matter).await.unwrap();
    assert_eq!(ballots.len(), 1);
    assert_eq!(ballots.get(&ADMIN), Some(&1));

    let mut scoped = proposal(ProposalType::Holder, vec![]);
    scoped.asset_code = Some(f.shares.code);
    let ballots = snapshot_ballots(&f.holdings, &f.state, &f.contract, &scoped).await.unwrap();
    assert_eq!(ballots.values().sum::<u64>(), 1000);
}

#[tokio::test]
async fn test_initiator_checks() {
    let f = fixture().await;
    let scope = ProposalScope {
        contract: &f.contract,
        asset: None,
        agreement: None,
    };

    let holder = proposal(ProposalType::Holder, vec![rename()]);
    validate_proposal(&scope, &holder, &HOLDER, 300, now()).unwrap();

    let err = validate_proposal(&scope, &holder, &OUTSIDER, 0, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::InsufficientQuantity);

    let admin = proposal(ProposalType::Administration, vec![]);
    let err = validate_proposal(&scope, &admin, &HOLDER, 300, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::NotOperator);
    validate_proposal(&scope, &admin, &ADMIN, 700, now()).unwrap();
}

#[tokio::test]
async fn test_malformed_proposals() {
    let f = fixture().await;
    let scope = ProposalScope {
        contract: &f.contract,
        asset: None,
        agreement: None,
    };

    let mut plurality = proposal(ProposalType::Administration, vec![rename()]);
    plurality.vote_system = 1;
    let err = validate_proposal(&scope, &plurality, &ADMIN, 0, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::VoteSystemNotPermitted);

    let mut three = proposal(ProposalType::Administration, vec![rename()]);
    three.vote_options = "ABC".to_string();
    let err = validate_proposal(&scope, &three, &ADMIN, 0, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::MsgMalformed);

    let mut late = proposal(ProposalType::Administration, vec![]);
    late.vote_cutoff = now();
    let err = validate_proposal(&scope, &late, &ADMIN, 0, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::MsgMalformed);

    let mut missing = proposal(ProposalType::Administration, vec![]);
    missing.vote_system = 5;
    let err = validate_proposal(&scope, &missing, &ADMIN, 0, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::MsgMalformed);

    let unknown = proposal(
        ProposalType::Administration,
        vec![AmendmentField::modify(vec![99u32], &1).unwrap()],
    );
    let err = validate_proposal(&scope, &unknown, &ADMIN, 0, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::MsgMalformed);
}

#[tokio::test]
async fn test_asset_proposals_respect_asset_flags() {
    let f = fixture().await;
    let scope = ProposalScope {
        contract: &f.contract,
        asset: Some(&f.shares),
        agreement: None,
    };

    let mut admin = proposal(ProposalType::Administration, vec![]);
    admin.asset_code = Some(f.shares.code);
    let err = validate_proposal(&scope, &admin, &ADMIN, 700, now()).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::AssetPermissions);

    let mut holder = proposal(ProposalType::Holder, vec![]);
    holder.asset_code = Some(f.shares.code);
    validate_proposal(&scope, &holder, &HOLDER, 300, now()).unwrap();
}

#[tokio::test]
async fn test_conflicts_until_applied() {
    let f = fixture().await;
    let first = proposal(ProposalType::Holder, vec![rename()]);
    let ballots = snapshot_ballots(&f.holdings, &f.state, &f.contract, &first).await.unwrap();
    let mut vote = Vote::open(TxId::new([1; 32]), TxId::new([2; 32]), &first, ballots, now());
    f.votes.save(&f.contract.address, &vote).await.unwrap();

    let second = proposal(ProposalType::Administration, vec![rename()]);
    let open = f.votes.list(&f.contract.address).await.unwrap();
    let err = check_conflicts(&second, &open).unwrap_err();
    assert_eq!(err.rejection_code(), RejectionCode::ProposalConflicts);

    let mut on_asset = second.clone();
    on_asset.asset_code = Some(f.shares.code);
    check_conflicts(&on_asset, &open).unwrap();

    vote.mark_applied(TxId::new([3; 32]), now()).unwrap();
    f.votes.save(&f.contract.address, &vote).await.unwrap();
    let open = f.votes.list(&f.contract.address).await.unwrap();
    check_conflicts(&second, &open).unwrap();

    let loaded = f
        .votes
        .fetch(&f.contract.address, &vote.vote_txid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, vote);
}
