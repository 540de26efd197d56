//! Node configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration.

use crate::error::{NodeError, NodeResult};
use serde::{Deserialize, Serialize};
use smartledger_core::Address;
use smartledger_protocol::FundingPolicy;
use smartledger_settlement::SettlementConfig;
use std::path::Path;
use std::time::Duration;

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_holdings_queue_capacity() -> usize {
    1024
}

fn default_dust_limit() -> u64 {
    546
}

fn default_response_fee() -> u64 {
    500
}

fn default_rejection_fee() -> u64 {
    200
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Seconds the first contract of a multi-contract transfer waits before
    /// rejecting it with `Timeout`
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Bound of the holdings write-behind queue
    #[serde(default = "default_holdings_queue_capacity")]
    pub holdings_queue_capacity: usize,

    #[serde(default = "default_dust_limit")]
    pub dust_limit: u64,

    #[serde(default = "default_response_fee")]
    pub response_fee: u64,

    #[serde(default = "default_rejection_fee")]
    pub rejection_fee: u64,

    /// Receives the contract fee named in the contract terms
    #[serde(default)]
    pub contract_fee_address: Option<Address>,

    #[serde(default)]
    pub is_test: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            holdings_queue_capacity: default_holdings_queue_capacity(),
            dust_limit: default_dust_limit(),
            response_fee: default_response_fee(),
            rejection_fee: default_rejection_fee(),
            contract_fee_address: None,
            is_test: false,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> NodeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.holdings_queue_capacity == 0 {
            return Err(NodeError::Config("holdings_queue_capacity must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(NodeError::Config("request_timeout_secs must be positive".to_string()));
        }
        if self.rejection_fee > self.response_fee {
            return Err(NodeError::Config(format!(
                "rejection_fee {} exceeds response_fee {}",
                self.rejection_fee, self.response_fee
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Funding thresholds for a contract charging `contract_fee`
    pub fn funding_policy(&self, contract_fee: u64) -> FundingPolicy {
        FundingPolicy {
            dust_limit: self.dust_limit,
            response_fee: self.response_fee,
            rejection_fee: self.rejection_fee,
            contract_fee,
            fee_address: self.contract_fee_address,
        }
    }

    pub fn settlement_config(&self) -> SettlementConfig {
        SettlementConfig {
            request_timeout: self.request_timeout(),
        }
    }
}
