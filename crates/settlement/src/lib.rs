//! SmartLedger Settlement - token transfers across one or more contracts
//!
//! - [`orchestrator::Orchestrator`]: drives a transfer from request to
//!   settlement or rejection
//! - [`ledger::TransferLedger`]: reserve, verify, finalize and revert holdings
//! - [`builder`]: the settlement transaction every contract completes
//! - [`pending::PendingRepository`]: in-flight transfers per contract

pub mod builder;
pub mod error;
pub mod layout;
pub mod ledger;
pub mod orchestrator;
pub mod pending;
pub mod refund;
pub mod state;
pub mod tracer;

pub use builder::{build_settlement, check_base, check_funding, is_complete, merge_assets, settlement_of};
pub use error::{SettlementError, SettlementResult};
pub use layout::TransferLayout;
pub use ledger::{Reservation, TransferLedger};
pub use orchestrator::{Orchestrator, Outcome, SettlementConfig};
pub use pending::{PendingRepository, PendingTransfer};
pub use refund::rejection_outputs;
pub use state::TransferState;
pub use tracer::Tracer;
