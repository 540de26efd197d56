//! SmartLedger Holdings - per-(contract, asset, address) balances
//!
//! - [`holding::Holding`]: pending/finalized balances and holding statuses
//! - [`cache::HoldingsCache`]: read-your-writes cache with a bounded
//!   write-behind queue

pub mod cache;
pub mod error;
pub mod holding;

pub use cache::{HoldingKey, HoldingsCache};
pub use error::{HoldingsError, HoldingsResult};
pub use holding::{Holding, HoldingStatus, HoldingStatusCode};
