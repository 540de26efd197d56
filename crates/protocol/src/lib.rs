//! SmartLedger Protocol - what contracts exchange
//!
//! - [`tx::Transaction`]: a decoded transaction with one [`action::Action`]
//! - [`response::ResponseWriter`]: funded responses and the no-response policy
//! - [`broadcast::Broadcaster`] / [`scheduler::Scheduler`]: outward seams
//! - [`txstore::TransactionRepository`]: transactions kept for later reference

pub mod action;
pub mod broadcast;
pub mod error;
pub mod response;
pub mod scheduler;
pub mod tx;
pub mod txstore;

pub use action::*;
pub use broadcast::{Broadcaster, MemoryBroadcaster};
pub use error::{ProtocolError, ProtocolResult};
pub use response::{FundingPolicy, Response, ResponseWriter};
pub use scheduler::{Job, JobKind, ManualScheduler, Scheduler};
pub use tx::{OutPoint, Transaction, TxInput, TxOutput};
pub use txstore::TransactionRepository;
