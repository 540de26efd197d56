//! Transfer lifecycle
//!
//! ```text
//! Requested ──► Reserved ──► Settled                                  (single contract)
//! Requested ──► Reserved ──► AwaitingSettlementRequest ──► Settled    (originating contract)
//!               Reserved ──► AwaitingSignatureRequest ──► Settled     (later contracts)
//! any non-terminal ──► Rejected
//! Reserved | AwaitingSettlementRequest ──► TimedOut ──► Rejected
//! ```

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransferState {
    /// Transfer seen, nothing reserved yet
    Requested,
    /// This contract's holdings are reserved
    Reserved,
    /// Settlement request is with the other contracts
    AwaitingSettlementRequest,
    /// Settlement data added here; waiting for the signature round
    AwaitingSignatureRequest,
    Settled,
    Rejected,
    TimedOut,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Settled | TransferState::Rejected)
    }

    pub fn can_time_out(&self) -> bool {
        matches!(self, TransferState::Reserved | TransferState::AwaitingSettlementRequest)
    }

    /// Whether `next` is a legal successor
    pub fn can_advance_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Requested, Reserved) => true,
            (Reserved, AwaitingSettlementRequest | AwaitingSignatureRequest | Settled) => true,
            (AwaitingSettlementRequest | AwaitingSignatureRequest, Settled) => true,
            (state, TimedOut) => state.can_time_out(),
            (TimedOut, Rejected) => true,
            (state, Rejected) => !state.is_terminal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        use TransferState::*;
        assert!(Requested.can_advance_to(Reserved));
        assert!(Reserved.can_advance_to(Settled));
        assert!(Reserved.can_advance_to(AwaitingSettlementRequest));
        assert!(AwaitingSettlementRequest.can_advance_to(Settled));
        assert!(AwaitingSignatureRequest.can_advance_to(Settled));
        assert!(!Requested.can_advance_to(Settled));
        assert!(!Settled.can_advance_to(Rejected));
    }

    #[test]
    fn test_timeout_only_while_waiting_on_peers() {
        use TransferState::*;
        assert!(AwaitingSettlementRequest.can_advance_to(TimedOut));
        assert!(Reserved.can_advance_to(TimedOut));
        assert!(!AwaitingSignatureRequest.can_advance_to(TimedOut));
        assert!(TimedOut.can_advance_to(Rejected));
        assert_eq!(AwaitingSettlementRequest.to_string(), "awaiting_settlement_request");
    }
}
