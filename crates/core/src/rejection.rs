//! Rejection codes
//!
//! Fixed taxonomy carried by every Rejection action. The string form is the
//! symbolic code that peers and wallets match on.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
pub enum RejectionCode {
    // === Message ===
    MsgMalformed,
    TxMalformed,
    Timeout,
    InsufficientTxFeeFunding,
    InvalidSignature,

    // === Contract ===
    ContractExists,
    ContractDoesNotExist,
    ContractMoved,
    ContractFrozen,
    ContractExpired,
    ContractPermissions,
    ContractAssetQtyReduction,
    ContractTypeNotPermitted,
    NotOperator,
    UnauthorizedAddress,

    // === Asset ===
    AssetNotFound,
    AssetNotPermitted,
    AssetFrozen,
    AssetPermissions,
    AssetAuthorizedQtyExceeded,

    // === Holdings ===
    InsufficientQuantity,
    HoldingsFrozen,
    HoldingsLocked,

    // === Transfer ===
    TransferExpired,

    // === Governance ===
    VoteNotFound,
    VoteClosed,
    VoteSystemNotPermitted,
    ProposalConflicts,

    // === Agreement ===
    AgreementExists,
    AgreementDoesNotExist,
}

impl RejectionCode {
    /// Human-readable label used as the prefix of rejection messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::MsgMalformed => "Message Malformed",
            Self::TxMalformed => "Transaction Malformed",
            Self::Timeout => "Timeout",
            Self::InsufficientTxFeeFunding => "Insufficient Transaction Fee Funding",
            Self::InvalidSignature => "Invalid Signature",
            Self::ContractExists => "Contract Already Exists",
            Self::ContractDoesNotExist => "Contract Does Not Exist",
            Self::ContractMoved => "Contract Moved",
            Self::ContractFrozen => "Contract Frozen",
            Self::ContractExpired => "Contract Expired",
            Self::ContractPermissions => "Contract Permissions Prohibit",
            Self::ContractAssetQtyReduction => "Contract Asset Quantity Reduction",
            Self::ContractTypeNotPermitted => "Contract Type Not Permitted",
            Self::NotOperator => "Not Operator",
            Self::UnauthorizedAddress => "Unauthorized Address",
            Self::AssetNotFound => "Asset Not Found",
            Self::AssetNotPermitted => "Asset Not Permitted",
            Self::AssetFrozen => "Asset Frozen",
            Self::AssetPermissions => "Asset Permissions Prohibit",
            Self::AssetAuthorizedQtyExceeded => "Asset Authorized Quantity Exceeded",
            Self::InsufficientQuantity => "Insufficient Quantity",
            Self::HoldingsFrozen => "Holdings Frozen",
            Self::HoldingsLocked => "Holdings Locked",
            Self::TransferExpired => "Transfer Expired",
            Self::VoteNotFound => "Vote Not Found",
            Self::VoteClosed => "Vote Closed",
            Self::VoteSystemNotPermitted => "Vote System Not Permitted",
            Self::ProposalConflicts => "Proposal Conflicts",
            Self::AgreementExists => "Agreement Already Exists",
            Self::AgreementDoesNotExist => "Agreement Does Not Exist",
        }
    }
}
