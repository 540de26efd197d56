//! SmartLedger Enforcement - compliance orders against the holdings ledger
//!
//! - [`authority`] - oracle signatures over order content
//! - [`engine::EnforcementEngine`] - plan an order, then commit it under the
//!   response transaction id
//! - [`repository::FreezeRepository`] - active freezes until thawed

pub mod authority;
pub mod engine;
pub mod error;
pub mod plan;
pub mod repository;

pub use authority::{order_sig_hash, sign_order, verify_authority};
pub use engine::EnforcementEngine;
pub use error::{EnforcementError, EnforcementResult};
pub use plan::{ConfiscationPlan, EnforcementPlan, FreezePlan, ReconciliationPlan, ThawPlan};
pub use repository::{FreezeRecord, FreezeRepository, FreezeScope};
