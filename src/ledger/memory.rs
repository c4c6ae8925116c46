//! In-memory lending ledger with per-reserve prices and loan-to-value limits.

use super::{InterestRateMode, LedgerError, LendingLedger, ReserveData};
use crate::domain::hashing::keccak256;
use crate::domain::{Address, Amount};
use crate::token::TokenBook;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Risk parameters of one listed asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveConfig {
    /// Price in a common unit of account.
    pub price: Decimal,
    /// Share of the supplied value that may be borrowed against.
    pub ltv: Decimal,
    pub borrowing_enabled: bool,
}

impl ReserveConfig {
    pub fn new(price: Decimal, ltv: Decimal) -> Self {
        Self {
            price,
            ltv,
            borrowing_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Reserve {
    config: ReserveConfig,
    data: ReserveData,
}

#[derive(Debug, Clone)]
pub struct MemoryLedger {
    address: Address,
    reserves: BTreeMap<Address, Reserve>,
    supplies: HashMap<(Address, Address), Amount>,
    debts: HashMap<(Address, Address), Amount>,
    touched: BTreeSet<Address>,
}

impl MemoryLedger {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            reserves: BTreeMap::new(),
            supplies: HashMap::new(),
            debts: HashMap::new(),
            touched: BTreeSet::new(),
        }
    }

    /// List `asset` with the given risk parameters.
    pub fn list_reserve(&mut self, asset: Address, config: ReserveConfig) -> Result<ReserveData, LedgerError> {
        if self.reserves.contains_key(&asset) {
            return Err(LedgerError::ReserveExists(asset));
        }
        let data = ReserveData {
            asset,
            collateral_token: Address::from_hash(&keccak256(&[b"supply", asset.as_bytes()])),
            debt_token: Address::from_hash(&keccak256(&[b"variable-debt", asset.as_bytes()])),
        };
        self.reserves.insert(asset, Reserve { config, data });
        Ok(data)
    }

    pub fn set_price(&mut self, asset: &Address, price: Decimal) -> Result<(), LedgerError> {
        let reserve = self
            .reserves
            .get_mut(asset)
            .ok_or(LedgerError::UnknownReserve(*asset))?;
        reserve.config.price = price;
        Ok(())
    }

    /// Grow every outstanding debt of `asset` by `rate` (0.01 = 1%).
    pub fn accrue_interest(&mut self, asset: &Address, rate: Decimal) -> Result<(), LedgerError> {
        self.reserve(asset)?;
        let factor = Decimal::ONE + rate;
        for ((_, debt_asset), debt) in self.debts.iter_mut() {
            if debt_asset == asset {
                *debt = debt.checked_mul(factor).ok_or(LedgerError::Overflow)?;
            }
        }
        Ok(())
    }

    /// Tokens of `asset` currently held by the pool and free to lend out.
    pub fn available_liquidity(&self, tokens: &TokenBook, asset: &Address) -> Amount {
        tokens.balance_of(asset, &self.address)
    }

    fn reserve(&self, asset: &Address) -> Result<&Reserve, LedgerError> {
        self.reserves
            .get(asset)
            .ok_or(LedgerError::UnknownReserve(*asset))
    }

    fn borrow_capacity(&self, account: &Address) -> Result<Amount, LedgerError> {
        let mut capacity = Amount::ZERO;
        for ((holder, asset), supplied) in &self.supplies {
            if holder != account {
                continue;
            }
            let config = self.reserve(asset)?.config;
            let value = supplied
                .checked_mul(config.price)
                .and_then(|v| v.checked_mul(config.ltv))
                .ok_or(LedgerError::Overflow)?;
            capacity = capacity.checked_add(value).ok_or(LedgerError::Overflow)?;
        }
        Ok(capacity)
    }

    fn debt_value(&self, account: &Address) -> Result<Amount, LedgerError> {
        let mut total = Amount::ZERO;
        for ((holder, asset), debt) in &self.debts {
            if holder != account {
                continue;
            }
            let value = debt
                .checked_mul(self.reserve(asset)?.config.price)
                .ok_or(LedgerError::Overflow)?;
            total = total.checked_add(value).ok_or(LedgerError::Overflow)?;
        }
        Ok(total)
    }
}

impl LendingLedger for MemoryLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn supply(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        on_behalf_of: Address,
    ) -> Result<(), LedgerError> {
        self.reserve(&asset)?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        tokens.transfer(&asset, &caller, &self.address, amount)?;
        let balance = self.collateral_balance(&on_behalf_of, &asset);
        let updated = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.supplies.insert((on_behalf_of, asset), updated);
        self.touched.insert(on_behalf_of);
        debug!(%asset, %on_behalf_of, %amount, "supply");
        Ok(())
    }

    fn borrow(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> Result<(), LedgerError> {
        let reserve = self.reserve(&asset)?;
        if !reserve.config.borrowing_enabled {
            return Err(LedgerError::BorrowingDisabled(asset));
        }
        if mode == InterestRateMode::Stable {
            return Err(LedgerError::StableRateUnsupported);
        }
        if caller != on_behalf_of {
            return Err(LedgerError::DelegationRequired {
                caller,
                on_behalf_of,
            });
        }
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let available = self.available_liquidity(tokens, &asset);
        if available < amount {
            return Err(LedgerError::InsufficientLiquidity {
                asset,
                available,
                requested: amount,
            });
        }
        tokens.transfer(&asset, &self.address, &caller, amount)?;
        let debt = self.debt_balance(&on_behalf_of, &asset);
        let updated = debt.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.debts.insert((on_behalf_of, asset), updated);
        self.touched.insert(on_behalf_of);
        debug!(%asset, %on_behalf_of, %amount, "borrow");
        Ok(())
    }

    fn repay(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        on_behalf_of: Address,
    ) -> Result<Amount, LedgerError> {
        self.reserve(&asset)?;
        let outstanding = self.debt_balance(&on_behalf_of, &asset);
        if outstanding.is_zero() {
            return Err(LedgerError::NothingToRepay {
                asset,
                account: on_behalf_of,
            });
        }
        let paid = amount.min(outstanding);
        if paid.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        tokens.transfer(&asset, &caller, &self.address, paid)?;
        let remaining = outstanding.saturating_sub(paid);
        if remaining.is_zero() {
            self.debts.remove(&(on_behalf_of, asset));
        } else {
            self.debts.insert((on_behalf_of, asset), remaining);
        }
        self.touched.insert(on_behalf_of);
        debug!(%asset, %on_behalf_of, %paid, "repay");
        Ok(paid)
    }

    fn withdraw(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        to: Address,
    ) -> Result<Amount, LedgerError> {
        self.reserve(&asset)?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let supplied = self.collateral_balance(&caller, &asset);
        let remaining = supplied
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientSupply {
                asset,
                account: caller,
                available: supplied,
                requested: amount,
            })?;
        let available = self.available_liquidity(tokens, &asset);
        if available < amount {
            return Err(LedgerError::InsufficientLiquidity {
                asset,
                available,
                requested: amount,
            });
        }
        tokens.transfer(&asset, &self.address, &to, amount)?;
        if remaining.is_zero() {
            self.supplies.remove(&(caller, asset));
        } else {
            self.supplies.insert((caller, asset), remaining);
        }
        self.touched.insert(caller);
        debug!(%asset, account = %caller, %to, %amount, "withdraw");
        Ok(amount)
    }

    fn reserve_data(&self, asset: &Address) -> Result<ReserveData, LedgerError> {
        Ok(self.reserve(asset)?.data)
    }

    fn collateral_balance(&self, account: &Address, asset: &Address) -> Amount {
        self.supplies
            .get(&(*account, *asset))
            .copied()
            .unwrap_or_default()
    }

    fn debt_balance(&self, account: &Address, asset: &Address) -> Amount {
        self.debts
            .get(&(*account, *asset))
            .copied()
            .unwrap_or_default()
    }

    fn settle(&mut self) -> Result<(), LedgerError> {
        let touched = std::mem::take(&mut self.touched);
        for account in touched {
            let debt = self.debt_value(&account)?;
            if debt.is_zero() {
                continue;
            }
            let capacity = self.borrow_capacity(&account)?;
            if debt > capacity {
                return Err(LedgerError::Undercollateralized {
                    account,
                    capacity,
                    debt,
                });
            }
        }
        Ok(())
    }
}
