//! Swap executor abstraction.
//!
//! An executor converts one asset into another by following an opaque
//! [`SwapInstruction`]. Callers never trust the amount it reports; they
//! measure their own balances before and after.

use crate::domain::{Address, Amount, SwapInstruction};
use crate::token::{TokenBook, TokenError};
use std::fmt;
use thiserror::Error;

pub mod mock;

pub use mock::{MockRoute, MockSwapExecutor};

pub trait SwapExecutor: Clone + Send + Sync + fmt::Debug + 'static {
    /// Account the caller must approve before calling [`execute`](Self::execute).
    fn address(&self) -> Address;

    /// Pull at most `instruction.amount_in` from `caller` through its
    /// allowance and pay the output asset back to `caller`.
    ///
    /// # Returns
    /// The output amount as claimed by the executor
    fn execute(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        instruction: &SwapInstruction,
    ) -> Result<Amount, SwapError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("malformed swap payload: {0}")]
    MalformedPayload(String),
    #[error("no route from {from} to {to}")]
    UnsupportedPair { from: Address, to: Address },
    #[error("executor holds {available} of {asset}, needs {required}")]
    InsufficientReserves {
        asset: Address,
        available: Amount,
        required: Amount,
    },
    #[error("amount overflow")]
    Overflow,
    #[error(transparent)]
    Token(#[from] TokenError),
}
