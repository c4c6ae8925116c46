//! Read-only position reporting across a factory's vaults.

use crate::domain::{Address, Amount};
use crate::ledger::LendingLedger;
use serde::{Deserialize, Serialize};

use super::factory::{Factory, VaultRegistry};
use super::vault::VaultState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    pub vault: Address,
    pub owner: Address,
    pub nonce: u64,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub collateral_balance: Amount,
    pub debt_balance: Amount,
    pub state: VaultState,
    /// Supply-position token of the collateral reserve, if the ledger knows it.
    pub collateral_token: Option<Address>,
    pub debt_token: Option<Address>,
}

/// Every vault `factory` deployed for `owner`, in allocation order, with
/// current ledger balances.
pub fn list_positions<L: LendingLedger>(
    owner: &Address,
    factory: &Factory,
    vaults: &VaultRegistry,
    ledger: &L,
) -> Vec<PositionView> {
    (0..factory.counter())
        .filter_map(|nonce| vaults.get(&factory.predict_address(nonce)))
        .filter(|vault| vault.owner == *owner)
        .map(|vault| PositionView {
            vault: vault.address,
            owner: vault.owner,
            nonce: vault.nonce,
            collateral_asset: vault.collateral_asset,
            debt_asset: vault.debt_asset,
            collateral_balance: ledger.collateral_balance(&vault.address, &vault.collateral_asset),
            debt_balance: ledger.debt_balance(&vault.address, &vault.debt_asset),
            state: vault.state(),
            collateral_token: ledger
                .reserve_data(&vault.collateral_asset)
                .ok()
                .map(|r| r.collateral_token),
            debt_token: ledger
                .reserve_data(&vault.debt_asset)
                .ok()
                .map(|r| r.debt_token),
        })
        .collect()
}
