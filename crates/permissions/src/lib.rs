//! SmartLedger Permissions - field-level authorization and amendments
//!
//! ## Key Components
//!
//! - [`fip::FieldIndexPath`] - path addressing a (possibly nested) field
//! - [`permission::PermissionTable`] - per-field gates with a default entry
//! - [`amendment::AmendmentField`] - one path-addressed change
//! - [`field`] - helpers for explicit per-entity field registries
//! - [`engine::apply_amendments`] - revision-checked, permission-gated application

pub mod amendment;
pub mod engine;
pub mod error;
pub mod field;
pub mod fip;
pub mod permission;

pub use amendment::{AmendmentField, AmendmentOp};
pub use engine::{
    apply_amendments, preview_amendments, Amendable, AmendmentAuthority, ProposalType,
    ACCEPT_RESULT,
};
pub use error::{PermissionError, PermissionResult};
pub use fip::FieldIndexPath;
pub use permission::{Permission, PermissionTable};
