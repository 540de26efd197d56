//! SmartLedger Node - one contract actor per address
//!
//! - [`actor::ContractActor`]: dispatches every transaction touching the
//!   contract to the entity, governance, enforcement and settlement logic
//! - [`config::NodeConfig`]: funding thresholds, timeouts, queue sizes
//! - [`context::NodeContext`]: an actor over a data directory, for the CLI

pub mod actor;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
mod handlers;

pub use actor::{ContractActor, Handled};
pub use config::NodeConfig;
pub use context::NodeContext;
pub use error::{NodeError, NodeResult};
