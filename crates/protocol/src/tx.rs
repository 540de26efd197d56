//! Decoded transactions
//!
//! The envelope format is external; the ledger sees a transaction as its
//! id, the spent outputs (with the spending address and value), the new
//! outputs and one action payload. The id covers everything but the input
//! signatures, so contracts can co-sign a transaction without changing it.

use crate::action::Action;
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use smartledger_core::{Address, ContractKey, MessageSignature, TxId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub outpoint: OutPoint,
    pub address: Address,
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<MessageSignature>,
}

impl TxInput {
    pub fn new(outpoint: OutPoint, address: Address, value: u64) -> Self {
        Self {
            outpoint,
            address,
            value,
            signature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Address,
    pub value: u64,
}

impl TxOutput {
    pub fn new(address: Address, value: u64) -> Self {
        Self { address, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: TxId,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub action: Action,
}

#[derive(Serialize)]
struct SigningView<'a> {
    inputs: Vec<(&'a OutPoint, &'a Address, u64)>,
    outputs: &'a [TxOutput],
    action: &'a Action,
}

impl Transaction {
    /// Build a transaction and compute its id
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>, action: Action) -> ProtocolResult<Self> {
        let mut tx = Self {
            txid: TxId::default(),
            inputs,
            outputs,
            action,
        };
        tx.txid = tx.compute_txid()?;
        Ok(tx)
    }

    /// Hash of the canonical JSON of everything except signatures
    pub fn compute_txid(&self) -> ProtocolResult<TxId> {
        let view = SigningView {
            inputs: self
                .inputs
                .iter()
                .map(|i| (&i.outpoint, &i.address, i.value))
                .collect(),
            outputs: &self.outputs,
            action: &self.action,
        };
        Ok(TxId::hash_of(&serde_json::to_vec(&view)?))
    }

    /// Recompute the id after the content changed; drops stale signatures
    pub fn rehash(&mut self) -> ProtocolResult<()> {
        let txid = self.compute_txid()?;
        if txid != self.txid {
            for input in &mut self.inputs {
                input.signature = None;
            }
            self.txid = txid;
        }
        Ok(())
    }

    /// Whether the stored id matches the content
    pub fn is_consistent(&self) -> bool {
        self.compute_txid().map(|id| id == self.txid).unwrap_or(false)
    }

    /// Sum of output values paid to `address`
    pub fn value_to(&self, address: &Address) -> u64 {
        self.outputs
            .iter()
            .filter(|o| o.address == *address)
            .map(|o| o.value)
            .sum()
    }

    /// Indices of outputs paid to `address`
    pub fn output_indices(&self, address: &Address) -> Vec<u32> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| o.address == *address)
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn output(&self, index: u32) -> Option<&TxOutput> {
        self.outputs.get(index as usize)
    }

    /// Whether `address` spends an input or receives an output
    pub fn touches(&self, address: &Address) -> bool {
        self.inputs.iter().any(|i| i.address == *address)
            || self.outputs.iter().any(|o| o.address == *address)
    }

    /// Address of the first input, the requester of a request transaction
    pub fn sender(&self) -> Option<&Address> {
        self.inputs.first().map(|i| &i.address)
    }

    /// Transaction whose output the first input spends
    pub fn ref_txid(&self) -> Option<TxId> {
        self.inputs.first().map(|i| i.outpoint.txid)
    }

    /// Sign every input spent by `key`'s address
    pub fn sign_inputs(&mut self, key: &ContractKey) -> usize {
        let address = key.address();
        let signature = key.sign(self.txid.as_bytes());
        let mut signed = 0;
        for input in self.inputs.iter_mut().filter(|i| i.address == address) {
            input.signature = Some(signature.clone());
            signed += 1;
        }
        signed
    }

    /// Verify one input's signature against the id and the input address
    pub fn verify_input(&self, index: usize) -> ProtocolResult<bool> {
        let input = self
            .inputs
            .get(index)
            .ok_or(ProtocolError::InputOutOfRange(index))?;
        let Some(signature) = &input.signature else {
            return Ok(false);
        };
        match signature.signer_address() {
            Ok(signer) if signer == input.address => {}
            _ => return Ok(false),
        }
        Ok(signature.verify(self.txid.as_bytes()).is_ok())
    }

    /// Verify every present signature; returns false on the first bad one
    pub fn verify_signatures(&self) -> ProtocolResult<bool> {
        for (index, input) in self.inputs.iter().enumerate() {
            if input.signature.is_some() && !self.verify_input(index)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_fully_signed(&self) -> bool {
        self.inputs.iter().all(|i| i.signature.is_some())
    }
}
