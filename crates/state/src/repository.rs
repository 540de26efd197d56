//! Contract, asset and agreement persistence

use crate::agreement::Agreement;
use crate::asset::Asset;
use crate::contract::Contract;
use crate::error::StateResult;
use smartledger_core::{Address, AssetCode};
use smartledger_storage::{get_json, put_json, Store};
use std::sync::Arc;

fn contract_key(contract: &Address) -> String {
    format!("contracts/{}/contract", contract)
}

fn asset_key(contract: &Address, code: &AssetCode) -> String {
    format!("contracts/{}/assets/{}", contract, code)
}

fn agreement_key(contract: &Address) -> String {
    format!("contracts/{}/agreement", contract)
}

/// Fetch/save access to the per-contract entities
#[derive(Clone)]
pub struct StateRepository {
    store: Arc<dyn Store>,
}

impl StateRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn fetch_contract(&self, address: &Address) -> StateResult<Option<Contract>> {
        Ok(get_json(self.store.as_ref(), &contract_key(address)).await?)
    }

    pub async fn save_contract(&self, contract: &Contract) -> StateResult<()> {
        put_json(self.store.as_ref(), &contract_key(&contract.address), contract).await?;
        Ok(())
    }

    /// Fetch an asset with the contract's voting system count attached
    pub async fn fetch_asset(&self, contract: &Contract, code: &AssetCode) -> StateResult<Option<Asset>> {
        let asset: Option<Asset> = get_json(self.store.as_ref(), &asset_key(&contract.address, code)).await?;
        Ok(asset.map(|a| a.with_voting_systems(contract.terms.voting_systems.len())))
    }

    pub async fn save_asset(&self, asset: &Asset) -> StateResult<()> {
        put_json(self.store.as_ref(), &asset_key(&asset.contract, &asset.code), asset).await?;
        Ok(())
    }

    /// Every asset listed by the contract, in definition order
    pub async fn list_assets(&self, contract: &Contract) -> StateResult<Vec<Asset>> {
        let mut assets = Vec::with_capacity(contract.asset_codes.len());
        for code in &contract.asset_codes {
            if let Some(asset) = self.fetch_asset(contract, code).await? {
                assets.push(asset);
            }
        }
        Ok(assets)
    }

    pub async fn fetch_agreement(&self, contract: &Address) -> StateResult<Option<Agreement>> {
        Ok(get_json(self.store.as_ref(), &agreement_key(contract)).await?)
    }

    pub async fn save_agreement(&self, agreement: &Agreement) -> StateResult<()> {
        put_json(self.store.as_ref(), &agreement_key(&agreement.contract), agreement).await?;
        Ok(())
    }
}
