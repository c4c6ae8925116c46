//! Vault factory: predicts, deploys and opens positions.

use crate::domain::{Address, Amount, PermitAuthorization, ProtocolEvent, SwapInstruction};
use crate::ledger::LendingLedger;
use crate::swap::SwapExecutor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::allocation::{derive_address, vault_template_hash, AllocationCounter};
use super::vault::{OpenReport, Vault};
use super::{Env, ProtocolError};

/// Parameters of an open funded by the caller's prior approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPosition {
    pub owner: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub deposit_amount: Amount,
    pub target_collateral: Amount,
    pub borrow_amount: Amount,
    pub swap: SwapInstruction,
    /// Address the caller approved. A mismatch means another open claimed
    /// the nonce first.
    #[serde(default)]
    pub expected_vault: Option<Address>,
}

/// Parameters of an open funded through a signed permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionWithPermit {
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub target_collateral: Amount,
    pub borrow_amount: Amount,
    pub swap: SwapInstruction,
    pub permit: PermitAuthorization,
}

/// Every vault ever deployed, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct VaultRegistry {
    vaults: BTreeMap<Address, Vault>,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &Address) -> Option<&Vault> {
        self.vaults.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Result<&mut Vault, ProtocolError> {
        self.vaults
            .get_mut(address)
            .ok_or(ProtocolError::UnknownVault(*address))
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.vaults.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    fn insert(&mut self, vault: Vault) -> Result<(), ProtocolError> {
        if self.vaults.contains_key(&vault.address) {
            return Err(ProtocolError::AllocationCollision {
                address: vault.address,
                nonce: vault.nonce,
            });
        }
        self.vaults.insert(vault.address, vault);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factory {
    pub address: Address,
    counter: AllocationCounter,
}

impl Factory {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            counter: AllocationCounter::new(),
        }
    }

    /// Number of vaults deployed so far, which is also the next nonce.
    pub fn counter(&self) -> u64 {
        self.counter.current()
    }

    pub fn predict_address(&self, nonce: u64) -> Address {
        derive_address(&self.address, nonce, &vault_template_hash())
    }

    pub fn next_address(&self) -> Address {
        self.predict_address(self.counter.current())
    }

    /// Deploy a vault for `request.owner` at the next address and open it
    /// with a deposit pulled from `caller`.
    pub fn open_position<L: LendingLedger, X: SwapExecutor>(
        &mut self,
        env: &mut Env<'_, L, X>,
        vaults: &mut VaultRegistry,
        caller: Address,
        request: &OpenPosition,
    ) -> Result<(Address, OpenReport), ProtocolError> {
        let nonce = self.counter.current();
        let address = self.predict_address(nonce);
        if let Some(expected) = request.expected_vault {
            if expected != address {
                return Err(ProtocolError::AllocationCollision {
                    address: expected,
                    nonce,
                });
            }
        }

        let mut vault = self.deploy(env, vaults, request.owner, request.collateral_asset, request.debt_asset)?;
        env.tokens.transfer_from(
            &request.collateral_asset,
            &address,
            &caller,
            &address,
            request.deposit_amount,
        )?;
        let report = vault.open(
            env,
            self.address,
            request.deposit_amount,
            request.borrow_amount,
            request.target_collateral,
            &request.swap,
        )?;
        vaults.insert(vault)?;
        info!(factory = %self.address, vault = %address, owner = %request.owner, nonce, "position opened");
        Ok((address, report))
    }

    /// Redeem `request.permit` and open a vault owned by the permit signer,
    /// funded with the permitted value.
    pub fn open_position_with_permit<L: LendingLedger, X: SwapExecutor>(
        &mut self,
        env: &mut Env<'_, L, X>,
        vaults: &mut VaultRegistry,
        caller: Address,
        request: &OpenPositionWithPermit,
    ) -> Result<(Address, OpenReport), ProtocolError> {
        let permit = &request.permit;
        let nonce = self.counter.current();
        let address = self.predict_address(nonce);
        if permit.spender != address {
            return Err(ProtocolError::AllocationCollision {
                address: permit.spender,
                nonce,
            });
        }
        if permit.token != request.collateral_asset {
            return Err(ProtocolError::PermitMismatch(format!(
                "permit token {} is not collateral {}",
                permit.token, request.collateral_asset
            )));
        }
        if permit.is_expired(env.now) {
            return Err(ProtocolError::PermitExpired {
                deadline: permit.deadline,
                now: env.now,
            });
        }

        env.tokens.permit(permit, env.now)?;
        env.emit(ProtocolEvent::PermitConsumed {
            token: permit.token,
            owner: permit.owner,
            spender: permit.spender,
            nonce: permit.nonce,
        });
        debug!(%caller, owner = %permit.owner, vault = %address, "permit redeemed");

        let open = OpenPosition {
            owner: permit.owner,
            collateral_asset: request.collateral_asset,
            debt_asset: request.debt_asset,
            deposit_amount: permit.value,
            target_collateral: request.target_collateral,
            borrow_amount: request.borrow_amount,
            swap: request.swap.clone(),
            expected_vault: Some(address),
        };
        self.open_position(env, vaults, permit.owner, &open)
    }

    fn deploy<L: LendingLedger, X: SwapExecutor>(
        &mut self,
        env: &mut Env<'_, L, X>,
        vaults: &VaultRegistry,
        owner: Address,
        collateral_asset: Address,
        debt_asset: Address,
    ) -> Result<Vault, ProtocolError> {
        let nonce = self.counter.current();
        let address = self.predict_address(nonce);
        if vaults.contains(&address) {
            return Err(ProtocolError::AllocationCollision { address, nonce });
        }
        if collateral_asset == debt_asset {
            return Err(ProtocolError::InvalidAmount(
                "collateral and debt asset must differ".to_string(),
            ));
        }
        env.ledger.reserve_data(&collateral_asset)?;
        env.ledger.reserve_data(&debt_asset)?;

        let claimed = self.counter.claim()?;
        env.emit(ProtocolEvent::VaultDeployed {
            factory: self.address,
            vault: address,
            owner,
            nonce: claimed,
        });
        debug!(factory = %self.address, vault = %address, nonce = claimed, "vault deployed");
        Ok(Vault::new(
            address,
            self.address,
            owner,
            claimed,
            collateral_asset,
            debt_asset,
        ))
    }
}
