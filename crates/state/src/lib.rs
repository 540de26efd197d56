//! SmartLedger State - contract, asset and agreement entities
//!
//! Each entity implements [`smartledger_permissions::Amendable`] through an
//! explicit field registry, so direct edits and vote-backed edits share one
//! amendment path.

pub mod agreement;
pub mod asset;
pub mod contract;
pub mod error;
pub mod repository;
pub mod voting;

pub use agreement::{term_references, Agreement, AgreementTerms, Chapter, Clause, DefinedTerm};
pub use asset::{Asset, AssetTerms, ADMINISTRATOR_CLASS, MEMBERSHIP_TYPE};
pub use contract::{Contract, ContractTerms, ContractType, Oracle};
pub use error::{StateError, StateResult};
pub use repository::StateRepository;
pub use voting::{validate_voting_systems, TallyLogic, VoteType, VotingSystem};
