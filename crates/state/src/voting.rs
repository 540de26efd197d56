//! Contract voting systems

use crate::error::{StateError, StateResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How a vote's winning option is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum VoteType {
    /// Share of cast weight must exceed the threshold
    #[serde(rename = "R")]
    #[strum(serialize = "R")]
    Relative,
    /// Share of eligible weight must exceed the threshold
    #[serde(rename = "A")]
    #[strum(serialize = "A")]
    Absolute,
    /// Highest tally wins
    #[serde(rename = "P")]
    #[strum(serialize = "P")]
    Plurality,
}

/// How ballot quantities are credited to ranked choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TallyLogic {
    /// Full quantity to every chosen option
    #[default]
    Standard,
    /// Quantity scaled down by choice rank
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSystem {
    pub name: String,
    pub vote_type: VoteType,
    #[serde(default)]
    pub tally_logic: TallyLogic,
    /// Percentage, strictly between 0 and 100
    pub threshold_percentage: Decimal,
    #[serde(default)]
    pub vote_multiplier_permitted: bool,
    #[serde(default)]
    pub holder_proposal_fee: u64,
}

impl VotingSystem {
    pub fn new(name: impl Into<String>, vote_type: VoteType, threshold_percentage: Decimal) -> Self {
        Self {
            name: name.into(),
            vote_type,
            tally_logic: TallyLogic::Standard,
            threshold_percentage,
            vote_multiplier_permitted: false,
            holder_proposal_fee: 0,
        }
    }

    pub fn with_tally_logic(mut self, tally_logic: TallyLogic) -> Self {
        self.tally_logic = tally_logic;
        self
    }

    pub fn with_vote_multiplier(mut self) -> Self {
        self.vote_multiplier_permitted = true;
        self
    }
}

/// Check every voting system of a contract
pub fn validate_voting_systems(systems: &[VotingSystem]) -> StateResult<()> {
    for (index, system) in systems.iter().enumerate() {
        if system.name.is_empty() {
            return Err(StateError::InvalidVotingSystem {
                index,
                reason: "missing name".to_string(),
            });
        }
        if system.threshold_percentage <= Decimal::ZERO
            || system.threshold_percentage >= Decimal::ONE_HUNDRED
        {
            return Err(StateError::InvalidVotingSystem {
                index,
                reason: format!(
                    "threshold {} outside (0, 100)",
                    system.threshold_percentage
                ),
            });
        }
    }
    Ok(())
}
