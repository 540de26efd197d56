//! Asset entity
//!
//! Field registry (first path index):
//!
//! | index | field |
//! |-------|-------|
//! | 1 | asset_type |
//! | 2 | payload |
//! | 3 | authorized_token_qty |
//! | 4 | permissions |
//! | 5 | voting_rights |
//! | 6 | vote_multiplier |
//! | 7 | enforcement_orders_permitted |
//! | 8 | transfers_permitted |
//! | 9 | administration_proposal |
//! | 10 | holder_proposal |
//! | 11 | trade_restrictions (list) |

use serde::{Deserialize, Serialize};
use smartledger_core::{Address, AssetCode, RejectionCode, Timestamp};
use smartledger_permissions::{
    field, Amendable, AmendmentOp, FieldIndexPath, PermissionError, PermissionResult,
    PermissionTable,
};

/// Asset type tag for membership assets
pub const MEMBERSHIP_TYPE: &str = "MEM";

/// Membership class that designates the administration's member asset
pub const ADMINISTRATOR_CLASS: &str = "Administrator";

fn default_vote_multiplier() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// The amendable terms of an asset, as carried by a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTerms {
    pub asset_type: String,
    /// Type-specific payload, opaque to the ledger
    #[serde(default)]
    pub payload: serde_json::Value,
    pub authorized_token_qty: u64,
    #[serde(default)]
    pub permissions: PermissionTable,
    #[serde(default)]
    pub voting_rights: bool,
    #[serde(default = "default_vote_multiplier")]
    pub vote_multiplier: u32,
    #[serde(default)]
    pub enforcement_orders_permitted: bool,
    #[serde(default = "default_true")]
    pub transfers_permitted: bool,
    #[serde(default)]
    pub administration_proposal: bool,
    #[serde(default)]
    pub holder_proposal: bool,
    #[serde(default)]
    pub trade_restrictions: Vec<String>,
}

impl AssetTerms {
    pub fn new(asset_type: impl Into<String>, authorized_token_qty: u64) -> Self {
        Self {
            asset_type: asset_type.into(),
            payload: serde_json::Value::Null,
            authorized_token_qty,
            permissions: PermissionTable::default(),
            voting_rights: false,
            vote_multiplier: 1,
            enforcement_orders_permitted: false,
            transfers_permitted: true,
            administration_proposal: false,
            holder_proposal: false,
            trade_restrictions: Vec::new(),
        }
    }

    /// Membership class named in the payload, if this is a membership asset
    pub fn membership_class(&self) -> Option<&str> {
        if self.asset_type != MEMBERSHIP_TYPE {
            return None;
        }
        self.payload.get("membership_class").and_then(|v| v.as_str())
    }

    pub fn is_admin_membership(&self) -> bool {
        self.membership_class() == Some(ADMINISTRATOR_CLASS)
    }

    /// Structural checks; permission width is checked against the contract
    pub fn validate(&self, voting_systems: usize) -> PermissionResult<()> {
        if self.asset_type.is_empty() {
            return Err(PermissionError::InvalidEntity("asset type is empty".into()));
        }
        if self.vote_multiplier == 0 {
            return Err(PermissionError::InvalidEntity("vote multiplier is zero".into()));
        }
        self.permissions.validate(voting_systems)
    }
}

/// Defined asset state, keyed by (contract, code)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub contract: Address,
    pub code: AssetCode,
    /// Position within the contract's asset list
    pub index: u64,
    pub revision: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub terms: AssetTerms,
    /// Asset-wide freeze expiry, zero when not frozen
    #[serde(default)]
    pub freeze_period: Timestamp,
    /// Width of the contract voting system list, checked on amendment
    #[serde(skip)]
    pub voting_systems: usize,
}

impl Asset {
    pub fn new(contract: Address, index: u64, terms: AssetTerms, now: Timestamp) -> Self {
        Self {
            contract,
            code: AssetCode::derive(&contract, index),
            index,
            revision: 0,
            created_at: now,
            updated_at: now,
            terms,
            freeze_period: Timestamp::ZERO,
            voting_systems: 0,
        }
    }

    /// Attach the owning contract's voting system count before amending
    pub fn with_voting_systems(mut self, voting_systems: usize) -> Self {
        self.voting_systems = voting_systems;
        self
    }

    pub fn is_frozen(&self, now: Timestamp) -> bool {
        now < self.freeze_period
    }

    /// Vote weight of one token for a voting system
    pub fn vote_weight(&self, multiplier_permitted: bool) -> u64 {
        if multiplier_permitted {
            self.terms.vote_multiplier as u64
        } else {
            1
        }
    }
}

impl Amendable for Asset {
    fn revision(&self) -> u32 {
        self.revision
    }

    fn set_revision(&mut self, revision: u32) {
        self.revision = revision;
    }

    fn permissions(&self) -> &PermissionTable {
        &self.terms.permissions
    }

    fn apply_field(
        &mut self,
        path: &FieldIndexPath,
        op: AmendmentOp,
        data: &[u8],
    ) -> PermissionResult<FieldIndexPath> {
        let indices = path.as_slice();
        let (head, rest) = match indices.split_first() {
            Some((head, rest)) => (*head, rest),
            None => return Err(PermissionError::UnknownField(path.clone())),
        };

        let t = &mut self.terms;
        let tail = match head {
            1 => field::set(&mut t.asset_type, path, op, rest, data)?,
            2 => field::set(&mut t.payload, path, op, rest, data)?,
            3 => field::set(&mut t.authorized_token_qty, path, op, rest, data)?,
            4 => field::set(&mut t.permissions, path, op, rest, data)?,
            5 => field::set(&mut t.voting_rights, path, op, rest, data)?,
            6 => field::set(&mut t.vote_multiplier, path, op, rest, data)?,
            7 => field::set(&mut t.enforcement_orders_permitted, path, op, rest, data)?,
            8 => field::set(&mut t.transfers_permitted, path, op, rest, data)?,
            9 => field::set(&mut t.administration_proposal, path, op, rest, data)?,
            10 => field::set(&mut t.holder_proposal, path, op, rest, data)?,
            11 => field::apply_list(
                &mut t.trade_restrictions,
                path,
                op,
                rest,
                data,
                field::no_subfields(path),
            )?,
            _ => return Err(PermissionError::UnknownField(path.clone())),
        };
        Ok(FieldIndexPath::new(vec![head]).join(&tail))
    }

    fn validate(&self) -> PermissionResult<()> {
        self.terms.validate(self.voting_systems)
    }

    fn permission_rejection(&self) -> RejectionCode {
        RejectionCode::AssetPermissions
    }
}
