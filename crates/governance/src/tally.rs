//! Ballot tallying
//!
//! Ballot quantities are credited to each chosen option (in full for
//! standard logic, scaled by rank for weighted logic). Winners are then
//! picked repeatedly: the highest remaining tally that passes the voting
//! system's test is appended to the result, until none passes.
//!
//! | vote type | passes when                                   |
//! |-----------|-----------------------------------------------|
//! | R         | tally / cast quantity > threshold             |
//! | A         | tally / eligible quantity > threshold         |
//! | P         | always (highest tally wins)                   |

use crate::vote::Ballot;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use smartledger_core::Address;
use smartledger_state::{TallyLogic, VoteType, VotingSystem};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// Tally per option, in option order
    pub option_tally: Vec<u64>,
    /// Winning options in order of tally, empty when none passed
    pub result: String,
    /// Quantity behind every completed ballot
    pub voted_quantity: u64,
}

/// Count ballots for a vote
///
/// `token_qty` is the total eligible quantity used by absolute votes.
pub fn tally(
    ballots: &BTreeMap<Address, Ballot>,
    options: &str,
    vote_max: u32,
    token_qty: u64,
    system: &VotingSystem,
) -> Tally {
    let options: Vec<char> = options.chars().collect();
    let mut tallies = vec![Decimal::ZERO; options.len()];
    let mut voted_quantity: u64 = 0;

    let max = Decimal::from(vote_max.max(1));
    for ballot in ballots.values() {
        if ballot.vote.is_empty() {
            continue;
        }

        let quantity = Decimal::from(ballot.quantity);
        for (rank, choice) in ballot.vote.chars().enumerate() {
            let score = match system.tally_logic {
                TallyLogic::Standard => quantity,
                TallyLogic::Weighted => {
                    let remaining = vote_max.saturating_sub(rank as u32);
                    quantity * Decimal::from(remaining) / max
                }
            };
            if let Some(position) = options.iter().position(|option| *option == choice) {
                tallies[position] += score;
            }
        }

        voted_quantity = voted_quantity.saturating_add(ballot.quantity);
    }

    let result = pick_winners(&options, &tallies, voted_quantity, token_qty, system);
    let option_tally = tallies
        .iter()
        .map(|t| t.trunc().to_u64().unwrap_or(0))
        .collect();

    debug!(%result, voted_quantity, "vote tallied");
    Tally {
        option_tally,
        result,
        voted_quantity,
    }
}

fn pick_winners(
    options: &[char],
    tallies: &[Decimal],
    voted_quantity: u64,
    token_qty: u64,
    system: &VotingSystem,
) -> String {
    let mut scored = vec![false; tallies.len()];
    let mut winners = String::new();

    loop {
        let mut best: Option<(usize, Decimal)> = None;
        for (i, tally) in tallies.iter().enumerate() {
            if scored[i] || *tally <= best.map_or(Decimal::ZERO, |(_, score)| score) {
                continue;
            }
            if passes(*tally, voted_quantity, token_qty, system) {
                best = Some((i, *tally));
            }
        }

        let Some((index, _)) = best else {
            break;
        };
        winners.push(options[index]);
        scored[index] = true;
    }

    winners
}

fn passes(tally: Decimal, voted_quantity: u64, token_qty: u64, system: &VotingSystem) -> bool {
    let base = match system.vote_type {
        VoteType::Plurality => return true,
        VoteType::Relative => voted_quantity,
        VoteType::Absolute => token_qty,
    };
    if base == 0 {
        return false;
    }
    tally * Decimal::ONE_HUNDRED / Decimal::from(base) > system.threshold_percentage
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use smartledger_core::Timestamp;

    fn ballots(entries: &[(u8, u64, &str)]) -> BTreeMap<Address, Ballot> {
        entries
            .iter()
            .map(|(n, quantity, vote)| {
                (
                    Address::new([*n; 20]),
                    Ballot {
                        quantity: *quantity,
                        vote: vote.to_string(),
                        timestamp: Timestamp::from_secs(1),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_relative_uses_cast_quantity() {
        let system = VotingSystem::new("Relative", VoteType::Relative, dec!(50));
        let b = ballots(&[(1, 60, "A"), (2, 40, "B"), (3, 900, "")]);
        let t = tally(&b, "AB", 1, 1000, &system);
        assert_eq!(t.option_tally, vec![60, 40]);
        assert_eq!(t.voted_quantity, 100);
        assert_eq!(t.result, "A");
    }

    #[test]
    fn test_absolute_uses_eligible_quantity() {
        let system = VotingSystem::new("Absolute", VoteType::Absolute, dec!(50));
        let b = ballots(&[(1, 60, "A"), (2, 40, "B")]);
        assert_eq!(tally(&b, "AB", 1, 1000, &system).result, "");
        assert_eq!(tally(&b, "AB", 1, 100, &system).result, "A");
    }

    #[test]
    fn test_threshold_is_strict() {
        let system = VotingSystem::new("Half", VoteType::Relative, dec!(50));
        let b = ballots(&[(1, 50, "A"), (2, 50, "B")]);
        assert_eq!(tally(&b, "AB", 1, 100, &system).result, "");
    }

    #[test]
    fn test_plurality_orders_all_options() {
        let system = VotingSystem::new("Plurality", VoteType::Plurality, dec!(1));
        let b = ballots(&[(1, 10, "B"), (2, 30, "C"), (3, 20, "A")]);
        assert_eq!(tally(&b, "ABC", 1, 60, &system).result, "CAB");
    }

    #[test]
    fn test_weighted_scales_by_rank() {
        let system =
            VotingSystem::new("Ranked", VoteType::Plurality, dec!(1)).with_tally_logic(TallyLogic::Weighted);
        let b = ballots(&[(1, 90, "AB"), (2, 60, "BA")]);
        let t = tally(&b, "AB", 3, 150, &system);
        // A: 90 * 3/3 + 60 * 2/3, B: 90 * 2/3 + 60 * 3/3
        assert_eq!(t.option_tally, vec![130, 120]);
        assert_eq!(t.result, "AB");
    }

    #[test]
    fn test_no_ballots_no_result() {
        let system = VotingSystem::new("Relative", VoteType::Relative, dec!(50));
        let t = tally(&BTreeMap::new(), "AB", 1, 1000, &system);
        assert_eq!(t.option_tally, vec![0, 0]);
        assert_eq!(t.result, "");
        assert_eq!(t.voted_quantity, 0);
    }
}
