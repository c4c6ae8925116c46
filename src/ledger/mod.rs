//! Lending ledger abstraction consumed by vaults.

use crate::domain::{Address, Amount};
use crate::token::{TokenBook, TokenError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod memory;

pub use memory::{MemoryLedger, ReserveConfig};

/// Interest mode of a borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestRateMode {
    Stable,
    Variable,
}

/// Position tokens of one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveData {
    pub asset: Address,
    /// Token representing supplied balances.
    pub collateral_token: Address,
    /// Token representing borrowed balances.
    pub debt_token: Address,
}

/// Lending ledger holding supply and borrow balances per asset per account.
///
/// Token movements go through the shared [`TokenBook`]. Every method is
/// called inside one staged transaction; implementations must be `Clone` so
/// the host can stage and discard them.
pub trait LendingLedger: Clone + Send + Sync + fmt::Debug + 'static {
    /// Account under which the ledger holds pooled tokens.
    fn address(&self) -> Address;

    /// Pull `amount` of `asset` from `caller` and credit it to `on_behalf_of`.
    fn supply(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        on_behalf_of: Address,
    ) -> Result<(), LedgerError>;

    /// Pay `amount` of `asset` to `caller` and record the debt on `on_behalf_of`.
    fn borrow(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> Result<(), LedgerError>;

    /// Pull up to `amount` from `caller` against the debt of `on_behalf_of`.
    /// Returns the amount actually repaid.
    fn repay(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        on_behalf_of: Address,
    ) -> Result<Amount, LedgerError>;

    /// Release `amount` of the caller's supplied `asset` to `to`.
    fn withdraw(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        asset: Address,
        amount: Amount,
        to: Address,
    ) -> Result<Amount, LedgerError>;

    fn reserve_data(&self, asset: &Address) -> Result<ReserveData, LedgerError>;

    fn collateral_balance(&self, account: &Address, asset: &Address) -> Amount;

    fn debt_balance(&self, account: &Address, asset: &Address) -> Amount;

    /// Enforce risk limits on every account touched since the last
    /// settlement. Runs once per call, right before commit.
    fn settle(&mut self) -> Result<(), LedgerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("asset {0} is not listed")]
    UnknownReserve(Address),
    #[error("reserve {0} already listed")]
    ReserveExists(Address),
    #[error("borrowing {0} is disabled")]
    BorrowingDisabled(Address),
    #[error("stable rate borrowing is not supported")]
    StableRateUnsupported,
    #[error("{caller} cannot borrow on behalf of {on_behalf_of}")]
    DelegationRequired {
        caller: Address,
        on_behalf_of: Address,
    },
    #[error("reserve {asset} has {available} available, {requested} requested")]
    InsufficientLiquidity {
        asset: Address,
        available: Amount,
        requested: Amount,
    },
    #[error("{account} supplied {available} of {asset}, {requested} requested")]
    InsufficientSupply {
        asset: Address,
        account: Address,
        available: Amount,
        requested: Amount,
    },
    #[error("{account} has no {asset} debt to repay")]
    NothingToRepay { asset: Address, account: Address },
    #[error("{account} would be undercollateralized: borrow capacity {capacity}, debt {debt}")]
    Undercollateralized {
        account: Address,
        capacity: Amount,
        debt: Amount,
    },
    #[error("amount must be positive")]
    ZeroAmount,
    #[error("amount overflow")]
    Overflow,
    #[error(transparent)]
    Token(#[from] TokenError),
}
