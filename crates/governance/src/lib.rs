//! SmartLedger Governance - proposal, vote, ballot, tally, result
//!
//! ## Lifecycle
//!
//! ```text
//! Proposal ──validate──► Vote (ballot snapshot) ──BallotCast*──► cutoff
//!                                                                  │
//!              amendments applied once ◄── Result ◄── tally ◄──────┘
//! ```
//!
//! - [`proposal::validate_proposal`] / [`proposal::check_conflicts`]
//! - [`proposal::snapshot_ballots`] - eligible quantities from holdings
//! - [`vote::Vote`] - ballots, completion and the applied marker
//! - [`tally::tally`] - standard and weighted tallies with R/A/P tests

pub mod error;
pub mod proposal;
pub mod repository;
pub mod tally;
pub mod vote;

pub use error::{GovernanceResult, VoteError};
pub use proposal::{check_conflicts, snapshot_ballots, validate_proposal, ProposalScope, AMENDMENT_OPTIONS};
pub use repository::VoteRepository;
pub use tally::{tally, Tally};
pub use vote::{Ballot, Vote, VoteTarget};
