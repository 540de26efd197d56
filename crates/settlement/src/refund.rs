//! Outputs of a transfer rejection
//!
//! Notified parties get a dust output each. Bitcoin senders get their
//! bitcoin back when the funding covers every refund; otherwise nobody is
//! refunded and the remainder goes to the administration to hold.

use smartledger_core::Address;
use smartledger_protocol::{FundingPolicy, TxOutput};

fn pay(outputs: &mut Vec<TxOutput>, address: Address, value: u64) {
    match outputs.iter_mut().find(|o| o.address == address) {
        Some(output) => output.value += value,
        None => outputs.push(TxOutput::new(address, value)),
    }
}

/// Rejection outputs for `available` funding
///
/// `requester` receives any change when refunds were paid.
pub fn rejection_outputs(
    policy: &FundingPolicy,
    available: u64,
    notify: &[Address],
    refunds: &[(Address, u64)],
    requester: Option<Address>,
    admin: Address,
) -> Vec<TxOutput> {
    let mut budget = available.saturating_sub(policy.rejection_fee);
    let mut outputs = Vec::new();

    for address in notify {
        if budget < policy.dust_limit {
            break;
        }
        if outputs.iter().any(|o: &TxOutput| o.address == *address) {
            continue;
        }
        outputs.push(TxOutput::new(*address, policy.dust_limit));
        budget -= policy.dust_limit;
    }

    let refund_total: u64 = refunds.iter().map(|(_, value)| *value).sum();
    let change_to = if refund_total <= budget {
        for (address, value) in refunds {
            pay(&mut outputs, *address, *value);
        }
        budget -= refund_total;
        requester.unwrap_or(admin)
    } else {
        admin
    };

    if budget >= policy.dust_limit {
        pay(&mut outputs, change_to, budget);
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Address = Address::new([1; 20]);
    const ALICE: Address = Address::new([2; 20]);
    const BOB: Address = Address::new([3; 20]);
    const PEER: Address = Address::new([4; 20]);

    #[test]
    fn test_refunds_and_change() {
        let outputs = rejection_outputs(
            &FundingPolicy::default(),
            10_000,
            &[PEER, ALICE],
            &[(BOB, 3_000)],
            Some(ALICE),
            ADMIN,
        );
        assert_eq!(
            outputs,
            vec![
                TxOutput::new(PEER, 546),
                TxOutput::new(ALICE, 546 + 10_000 - 200 - 546 - 546 - 3_000),
                TxOutput::new(BOB, 3_000),
            ]
        );
    }

    #[test]
    fn test_unaffordable_refunds_go_to_admin() {
        let outputs = rejection_outputs(
            &FundingPolicy::default(),
            2_000,
            &[ALICE],
            &[(BOB, 5_000)],
            Some(ALICE),
            ADMIN,
        );
        assert_eq!(
            outputs,
            vec![TxOutput::new(ALICE, 546), TxOutput::new(ADMIN, 2_000 - 200 - 546)]
        );
    }

    #[test]
    fn test_notifications_stop_when_funding_runs_out() {
        let outputs = rejection_outputs(&FundingPolicy::default(), 1_000, &[PEER, ALICE, BOB], &[], None, ADMIN);
        assert_eq!(outputs, vec![TxOutput::new(PEER, 546)]);
    }
}
