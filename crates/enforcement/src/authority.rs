//! Order authority signatures
//!
//! An oracle listed by the contract may back an order by signing the
//! SHA-256 of the canonical JSON of `(contract address, order)`, with the
//! order's own authority field cleared.

use crate::error::{EnforcementError, EnforcementResult};
use serde::Serialize;
use smartledger_core::{sha256, Address, ContractKey};
use smartledger_protocol::{Order, OrderAuthority};
use smartledger_state::Contract;
use tracing::debug;

#[derive(Serialize)]
struct SignedContent<'a> {
    contract: &'a Address,
    order: &'a Order,
}

/// Hash an authority signs for an order sent to `contract`
pub fn order_sig_hash(contract: &Address, order: &Order) -> EnforcementResult<[u8; 32]> {
    let mut unsigned = order.clone();
    unsigned.authority = None;
    let bytes = serde_json::to_vec(&SignedContent {
        contract,
        order: &unsigned,
    })?;
    Ok(sha256(&bytes))
}

/// Sign an order as an authority
pub fn sign_order(
    key: &ContractKey,
    name: impl Into<String>,
    contract: &Address,
    order: &Order,
) -> EnforcementResult<OrderAuthority> {
    let hash = order_sig_hash(contract, order)?;
    Ok(OrderAuthority {
        name: name.into(),
        signature: key.sign(&hash),
    })
}

/// Check the order's authority, if it carries one
pub fn verify_authority(contract: &Contract, order: &Order) -> EnforcementResult<()> {
    let Some(authority) = &order.authority else {
        return Ok(());
    };

    let signer = authority
        .signature
        .signer_address()
        .map_err(|e| EnforcementError::InvalidSignature(e.to_string()))?;
    let oracle = contract
        .oracle(&signer)
        .ok_or_else(|| EnforcementError::InvalidSignature(format!("{} is not a contract oracle", signer)))?;
    if !oracle.public_key.eq_ignore_ascii_case(&authority.signature.public_key) {
        return Err(EnforcementError::InvalidSignature(format!(
            "public key does not match oracle {}",
            signer
        )));
    }

    let hash = order_sig_hash(&contract.address, order)?;
    authority
        .signature
        .verify(&hash)
        .map_err(|e| EnforcementError::InvalidSignature(e.to_string()))?;

    debug!(authority = %authority.name, "order authority verified");
    Ok(())
}
