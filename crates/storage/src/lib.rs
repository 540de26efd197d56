//! SmartLedger Storage - key/value persistence
//!
//! Every entity (contract, asset, holding, vote, agreement, transaction,
//! pending transfer) is fetched and saved by key through the [`Store`] trait.
//! No particular storage engine is assumed.

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{get_json, put_json, FileStore, MemoryStore, Store};
