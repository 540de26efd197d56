//! Contract entity
//!
//! Field registry (first path index):
//!
//! | index | field |
//! |-------|-------|
//! | 1 | name |
//! | 2 | contract_type |
//! | 3 | admin_address |
//! | 4 | operator_address |
//! | 5 | master_address |
//! | 6 | voting_systems (list; element fields 1-6) |
//! | 7 | permissions |
//! | 8 | oracles (list) |
//! | 9 | administration_proposal |
//! | 10 | holder_proposal |
//! | 11 | contract_fee |
//! | 12 | contract_expiration |
//! | 13 | restricted_qty_assets |

use crate::voting::{validate_voting_systems, VotingSystem};
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, AssetCode, RejectionCode, Timestamp};
use smartledger_permissions::{
    field, Amendable, AmendmentOp, FieldIndexPath, PermissionError, PermissionResult,
    PermissionTable,
};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContractType {
    /// Represents an entity; holds membership assets only
    Entity,
    /// Issues instruments
    #[default]
    Instrument,
}

/// An authority whose signature can back enforcement orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub address: Address,
    /// Hex-encoded ed25519 verifying key
    pub public_key: String,
}

/// The amendable terms of a contract, as carried by an offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub name: String,
    #[serde(default)]
    pub contract_type: ContractType,
    pub admin_address: Address,
    #[serde(default)]
    pub operator_address: Option<Address>,
    #[serde(default)]
    pub master_address: Option<Address>,
    #[serde(default)]
    pub voting_systems: Vec<VotingSystem>,
    #[serde(default)]
    pub permissions: PermissionTable,
    #[serde(default)]
    pub oracles: Vec<Oracle>,
    #[serde(default)]
    pub administration_proposal: bool,
    #[serde(default)]
    pub holder_proposal: bool,
    /// Fee paid to the contract fee address on every request
    #[serde(default)]
    pub contract_fee: u64,
    /// Zero means the contract never expires
    #[serde(default)]
    pub contract_expiration: Timestamp,
    /// Maximum number of assets, zero means unlimited
    #[serde(default)]
    pub restricted_qty_assets: u64,
}

impl ContractTerms {
    pub fn new(name: impl Into<String>, admin_address: Address) -> Self {
        Self {
            name: name.into(),
            contract_type: ContractType::Instrument,
            admin_address,
            operator_address: None,
            master_address: None,
            voting_systems: Vec::new(),
            permissions: PermissionTable::default(),
            oracles: Vec::new(),
            administration_proposal: false,
            holder_proposal: false,
            contract_fee: 0,
            contract_expiration: Timestamp::ZERO,
            restricted_qty_assets: 0,
        }
    }

    /// Structural checks shared by offers and amendments
    pub fn validate(&self) -> PermissionResult<()> {
        if self.name.is_empty() {
            return Err(PermissionError::InvalidEntity("contract name is empty".into()));
        }
        validate_voting_systems(&self.voting_systems)
            .map_err(|e| PermissionError::InvalidEntity(e.to_string()))?;
        self.permissions.validate(self.voting_systems.len())?;
        Ok(())
    }
}

/// Formed contract state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub address: Address,
    pub revision: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub terms: ContractTerms,
    #[serde(default)]
    pub asset_codes: Vec<AssetCode>,
    #[serde(default)]
    pub admin_member_asset: Option<AssetCode>,
    /// Contract-wide freeze expiry, zero when not frozen
    #[serde(default)]
    pub freeze_period: Timestamp,
    #[serde(default)]
    pub moved_to: Option<Address>,
}

impl Contract {
    pub fn new(address: Address, terms: ContractTerms, now: Timestamp) -> Self {
        Self {
            address,
            revision: 0,
            created_at: now,
            updated_at: now,
            terms,
            asset_codes: Vec::new(),
            admin_member_asset: None,
            freeze_period: Timestamp::ZERO,
            moved_to: None,
        }
    }

    pub fn admin_address(&self) -> Address {
        self.terms.admin_address
    }

    /// Administration or operator
    pub fn is_operator(&self, address: &Address) -> bool {
        self.terms.admin_address == *address || self.terms.operator_address.as_ref() == Some(address)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        !self.terms.contract_expiration.is_zero() && self.terms.contract_expiration < now
    }

    pub fn is_frozen(&self, now: Timestamp) -> bool {
        now < self.freeze_period
    }

    /// Whether another asset can be defined
    pub fn can_have_more_assets(&self) -> bool {
        self.terms.restricted_qty_assets == 0
            || (self.asset_codes.len() as u64) < self.terms.restricted_qty_assets
    }

    pub fn voting_system(&self, index: u32) -> Option<&VotingSystem> {
        self.terms.voting_systems.get(index as usize)
    }

    pub fn oracle(&self, address: &Address) -> Option<&Oracle> {
        self.terms.oracles.iter().find(|o| o.address == *address)
    }

    pub fn add_asset_code(&mut self, code: AssetCode) {
        if !self.asset_codes.contains(&code) {
            self.asset_codes.push(code);
        }
    }
}

fn modify_voting_system(
    path: &FieldIndexPath,
) -> impl FnOnce(&mut VotingSystem, &[u32], &[u8]) -> PermissionResult<Vec<u32>> + '_ {
    move |system, sub, data| {
        let op = AmendmentOp::Modify;
        let rest = &sub[1..];
        match sub[0] {
            1 => field::set(&mut system.name, path, op, rest, data)?,
            2 => field::set(&mut system.vote_type, path, op, rest, data)?,
            3 => field::set(&mut system.tally_logic, path, op, rest, data)?,
            4 => field::set(&mut system.threshold_percentage, path, op, rest, data)?,
            5 => field::set(&mut system.vote_multiplier_permitted, path, op, rest, data)?,
            6 => field::set(&mut system.holder_proposal_fee, path, op, rest, data)?,
            _ => return Err(PermissionError::UnknownField(path.clone())),
        };
        Ok(vec![sub[0]])
    }
}

impl Amendable for Contract {
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
            1 => field::set(&mut t.name, path, op, rest, data)?,
            2 => field::set(&mut t.contract_type, path, op, rest, data)?,
            3 => field::set(&mut t.admin_address, path, op, rest, data)?,
            4 => field::set(&mut t.operator_address, path, op, rest, data)?,
            5 => field::set(&mut t.master_address, path, op, rest, data)?,
            6 => field::apply_list(
                &mut t.voting_systems,
                path,
                op,
                rest,
                data,
                modify_voting_system(path),
            )?,
            7 => field::set(&mut t.permissions, path, op, rest, data)?,
            8 => field::apply_list(&mut t.oracles, path, op, rest, data, field::no_subfields(path))?,
            9 => field::set(&mut t.administration_proposal, path, op, rest, data)?,
            10 => field::set(&mut t.holder_proposal, path, op, rest, data)?,
            11 => field::set(&mut t.contract_fee, path, op, rest, data)?,
            12 => field::set(&mut t.contract_expiration, path, op, rest, data)?,
            13 => field::set(&mut t.restricted_qty_assets, path, op, rest, data)?,
            _ => return Err(PermissionError::UnknownField(path.clone())),
        };
        Ok(FieldIndexPath::new(vec![head]).join(&tail))
    }

    fn validate(&self) -> PermissionResult<()> {
        self.terms.validate()
    }

    fn permission_rejection(&self) -> RejectionCode {
        RejectionCode::ContractPermissions
    }
}
