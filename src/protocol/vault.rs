//! One leveraged position and its lifecycle.

use crate::domain::{Address, Amount, ProtocolEvent, SwapInstruction};
use crate::ledger::{InterestRateMode, LendingLedger};
use crate::swap::SwapExecutor;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::{Env, ProtocolError};

/// Pending -> Open -> Closed. No other transitions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultState {
    /// Deployed, `open` not yet run. Never observable after a commit.
    Pending,
    Open,
    Closed,
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VaultState::Pending => "pending",
            VaultState::Open => "open",
            VaultState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub address: Address,
    pub factory: Address,
    pub owner: Address,
    /// Factory nonce the vault was allocated at.
    pub nonce: u64,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    state: VaultState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReport {
    pub deposit: Amount,
    pub borrowed: Amount,
    /// Collateral the swap actually delivered.
    pub swap_output: Amount,
    pub collateral_balance: Amount,
    pub debt_balance: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseReport {
    pub repaid: Amount,
    /// Collateral released from the ledger to the owner.
    pub withdrawn: Amount,
    pub collateral_balance: Amount,
    pub debt_balance: Amount,
}

impl Vault {
    pub fn new(
        address: Address,
        factory: Address,
        owner: Address,
        nonce: u64,
        collateral_asset: Address,
        debt_asset: Address,
    ) -> Self {
        Self {
            address,
            factory,
            owner,
            nonce,
            collateral_asset,
            debt_asset,
            state: VaultState::Pending,
        }
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    fn require_state(&self, expected: VaultState, action: &'static str) -> Result<(), ProtocolError> {
        if self.state != expected {
            return Err(ProtocolError::InvalidState {
                vault: self.address,
                state: self.state,
                action,
            });
        }
        Ok(())
    }

    fn require_owner(&self, caller: Address, action: &'static str) -> Result<(), ProtocolError> {
        if caller != self.owner {
            return Err(ProtocolError::Authorization { caller, action });
        }
        Ok(())
    }

    /// Supply the deposit already held by the vault, borrow, swap the
    /// borrowed asset into collateral and supply the output.
    ///
    /// Only the deploying factory may call this, once.
    pub fn open<L: LendingLedger, X: SwapExecutor>(
        &mut self,
        env: &mut Env<'_, L, X>,
        caller: Address,
        deposit: Amount,
        borrow_amount: Amount,
        target_collateral: Amount,
        swap: &SwapInstruction,
    ) -> Result<OpenReport, ProtocolError> {
        if caller != self.factory {
            return Err(ProtocolError::Authorization {
                caller,
                action: "open",
            });
        }
        self.require_state(VaultState::Pending, "open")?;
        if deposit.is_zero() || borrow_amount.is_zero() {
            return Err(ProtocolError::InvalidAmount(
                "deposit and borrow must be positive".to_string(),
            ));
        }
        if swap.amount_in > borrow_amount {
            return Err(ProtocolError::InvalidAmount(format!(
                "swap input {} exceeds borrow {}",
                swap.amount_in, borrow_amount
            )));
        }

        let me = self.address;
        env.ledger
            .supply(env.tokens, me, self.collateral_asset, deposit, me)?;
        debug!(vault = %me, %deposit, "supplied deposit");
        env.ledger.borrow(
            env.tokens,
            me,
            self.debt_asset,
            borrow_amount,
            InterestRateMode::Variable,
            me,
        )?;
        debug!(vault = %me, borrowed = %borrow_amount, "borrowed");

        let swap_output = execute_swap(env, me, self.debt_asset, self.collateral_asset, swap)?;
        if !swap_output.is_zero() {
            env.ledger
                .supply(env.tokens, me, self.collateral_asset, swap_output, me)?;
        }

        let collateral_balance = env.ledger.collateral_balance(&me, &self.collateral_asset);
        let debt_balance = env.ledger.debt_balance(&me, &self.debt_asset);
        if collateral_balance < target_collateral {
            return Err(ProtocolError::Slippage {
                received: collateral_balance,
                required: target_collateral,
            });
        }
        if debt_balance != borrow_amount {
            return Err(ProtocolError::DebtMismatch {
                expected: borrow_amount,
                actual: debt_balance,
            });
        }

        self.state = VaultState::Open;
        env.emit(ProtocolEvent::PositionOpened {
            vault: me,
            owner: self.owner,
            deposit,
            borrowed: borrow_amount,
            swap_output,
            collateral_balance,
            debt_balance,
        });
        Ok(OpenReport {
            deposit,
            borrowed: borrow_amount,
            swap_output,
            collateral_balance,
            debt_balance,
        })
    }

    /// Withdraw `swap.amount_in` collateral, swap it into the debt asset,
    /// repay `repay_amount` and send `withdraw_amount` collateral to the owner.
    pub fn close_partial<L: LendingLedger, X: SwapExecutor>(
        &mut self,
        env: &mut Env<'_, L, X>,
        caller: Address,
        repay_amount: Amount,
        withdraw_amount: Amount,
        swap: &SwapInstruction,
    ) -> Result<CloseReport, ProtocolError> {
        self.require_owner(caller, "close")?;
        self.require_state(VaultState::Open, "close partially")?;
        if repay_amount.is_zero() && withdraw_amount.is_zero() && swap.amount_in.is_zero() {
            return Err(ProtocolError::InvalidAmount("nothing to close".to_string()));
        }

        let me = self.address;
        if !swap.amount_in.is_zero() {
            env.ledger
                .withdraw(env.tokens, me, self.collateral_asset, swap.amount_in, me)?;
            execute_swap(env, me, self.collateral_asset, self.debt_asset, swap)?;
        }

        let repaid = if repay_amount.is_zero() {
            Amount::ZERO
        } else {
            let held = env.tokens.balance_of(&self.debt_asset, &me);
            if held < repay_amount {
                return Err(ProtocolError::InsufficientRepayment {
                    debt: repay_amount,
                    available: held,
                });
            }
            env.ledger
                .repay(env.tokens, me, self.debt_asset, repay_amount, me)?
        };

        if !withdraw_amount.is_zero() {
            env.ledger.withdraw(
                env.tokens,
                me,
                self.collateral_asset,
                withdraw_amount,
                self.owner,
            )?;
        }

        let collateral_balance = env.ledger.collateral_balance(&me, &self.collateral_asset);
        let debt_balance = env.ledger.debt_balance(&me, &self.debt_asset);
        debug!(vault = %me, %repaid, withdrawn = %withdraw_amount, "position reduced");
        env.emit(ProtocolEvent::PositionReduced {
            vault: me,
            owner: self.owner,
            repaid,
            withdrawn: withdraw_amount,
            collateral_balance,
            debt_balance,
        });
        Ok(CloseReport {
            repaid,
            withdrawn: withdraw_amount,
            collateral_balance,
            debt_balance,
        })
    }

    /// Repay the whole current debt, return every remaining token to the
    /// owner and close the vault for good.
    pub fn close_full<L: LendingLedger, X: SwapExecutor>(
        &mut self,
        env: &mut Env<'_, L, X>,
        caller: Address,
        swap: &SwapInstruction,
    ) -> Result<CloseReport, ProtocolError> {
        self.require_owner(caller, "close")?;
        self.require_state(VaultState::Open, "close")?;

        let me = self.address;
        let debt = env.ledger.debt_balance(&me, &self.debt_asset);
        if !swap.amount_in.is_zero() {
            env.ledger
                .withdraw(env.tokens, me, self.collateral_asset, swap.amount_in, me)?;
            execute_swap(env, me, self.collateral_asset, self.debt_asset, swap)?;
        }

        let available = env.tokens.balance_of(&self.debt_asset, &me);
        if available < debt {
            return Err(ProtocolError::InsufficientRepayment { debt, available });
        }
        let repaid = if debt.is_zero() {
            Amount::ZERO
        } else {
            env.ledger.repay(env.tokens, me, self.debt_asset, debt, me)?
        };

        let withdrawn = env.ledger.collateral_balance(&me, &self.collateral_asset);
        if !withdrawn.is_zero() {
            env.ledger
                .withdraw(env.tokens, me, self.collateral_asset, withdrawn, self.owner)?;
        }

        for asset in [self.collateral_asset, self.debt_asset] {
            let idle = env.tokens.balance_of(&asset, &me);
            env.tokens.transfer(&asset, &me, &self.owner, idle)?;
        }

        let remaining_debt = env.ledger.debt_balance(&me, &self.debt_asset);
        if !remaining_debt.is_zero() {
            return Err(ProtocolError::DebtMismatch {
                expected: Amount::ZERO,
                actual: remaining_debt,
            });
        }

        self.state = VaultState::Closed;
        debug!(vault = %me, %repaid, %withdrawn, "position closed");
        env.emit(ProtocolEvent::PositionClosed {
            vault: me,
            owner: self.owner,
            repaid,
            withdrawn,
        });
        Ok(CloseReport {
            repaid,
            withdrawn,
            collateral_balance: Amount::ZERO,
            debt_balance: Amount::ZERO,
        })
    }
}

/// Run `swap` from `holder`, converting `from` into `to`, and return what
/// `holder` actually received.
///
/// The executor is approved for exactly `swap.amount_in` and the approval is
/// cleared afterwards. Its self-reported output is ignored.
fn execute_swap<L: LendingLedger, X: SwapExecutor>(
    env: &mut Env<'_, L, X>,
    holder: Address,
    from: Address,
    to: Address,
    swap: &SwapInstruction,
) -> Result<Amount, ProtocolError> {
    let router = env.executor.address();
    let in_before = env.tokens.balance_of(&from, &holder);
    let out_before = env.tokens.balance_of(&to, &holder);

    env.tokens.approve(&from, &holder, &router, swap.amount_in)?;
    let claimed = env.executor.execute(env.tokens, holder, swap)?;
    env.tokens.approve(&from, &holder, &router, Amount::ZERO)?;

    let spent = in_before.saturating_sub(env.tokens.balance_of(&from, &holder));
    if spent > swap.amount_in {
        return Err(ProtocolError::SwapOverspent {
            spent,
            allowed: swap.amount_in,
        });
    }
    let received = env
        .tokens
        .balance_of(&to, &holder)
        .saturating_sub(out_before);
    if received < swap.min_amount_out {
        return Err(ProtocolError::Slippage {
            received,
            required: swap.min_amount_out,
        });
    }
    debug!(%holder, %spent, %received, %claimed, "swap settled");
    Ok(received)
}
