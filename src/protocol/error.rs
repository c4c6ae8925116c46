use crate::domain::{Address, Amount, Timestamp};
use crate::ledger::LedgerError;
use crate::swap::SwapError;
use crate::token::TokenError;
use thiserror::Error;

use super::vault::VaultState;

/// Why a protocol call reverted. Every variant means nothing was committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{caller} is not authorized to {action}")]
    Authorization { caller: Address, action: &'static str },
    #[error("transfer failed: {0}")]
    Allowance(TokenError),
    #[error("ledger rejected the call: {0}")]
    Ledger(LedgerError),
    #[error("swap delivered {received}, at least {required} required")]
    Slippage { received: Amount, required: Amount },
    #[error("swap pulled {spent}, at most {allowed} allowed")]
    SwapOverspent { spent: Amount, allowed: Amount },
    #[error("permit expired at {deadline}, now {now}")]
    PermitExpired { deadline: Timestamp, now: Timestamp },
    #[error("permit nonce {nonce} already consumed (current {current})")]
    PermitReplay { nonce: u64, current: u64 },
    #[error("invalid permit signature")]
    InvalidSignature,
    #[error("permit does not match the call: {0}")]
    PermitMismatch(String),
    #[error("allocation collision at {address} (nonce {nonce})")]
    AllocationCollision { address: Address, nonce: u64 },
    #[error("vault {vault} is {state}, cannot {action}")]
    InvalidState {
        vault: Address,
        state: VaultState,
        action: &'static str,
    },
    #[error("position debt is {actual}, expected {expected}")]
    DebtMismatch { expected: Amount, actual: Amount },
    #[error("swap output {available} cannot cover debt {debt}")]
    InsufficientRepayment { debt: Amount, available: Amount },
    #[error("unknown vault {0}")]
    UnknownVault(Address),
    #[error("unknown factory {0}")]
    UnknownFactory(Address),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("swap failed: {0}")]
    Swap(SwapError),
    #[error("amount overflow")]
    Overflow,
}

impl From<TokenError> for ProtocolError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::PermitExpired { deadline, now } => {
                ProtocolError::PermitExpired { deadline, now }
            }
            TokenError::PermitReplay { nonce, current } => {
                ProtocolError::PermitReplay { nonce, current }
            }
            TokenError::InvalidSignature | TokenError::PermitNonceAhead { .. } => {
                ProtocolError::InvalidSignature
            }
            TokenError::PermitUnsupported(token) => {
                ProtocolError::PermitMismatch(format!("token {} does not support permits", token))
            }
            other => ProtocolError::Allowance(other),
        }
    }
}

impl From<LedgerError> for ProtocolError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Token(token) => ProtocolError::Allowance(token),
            other => ProtocolError::Ledger(other),
        }
    }
}

impl From<SwapError> for ProtocolError {
    fn from(err: SwapError) -> Self {
        ProtocolError::Swap(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_errors_keep_their_identity() {
        let expired = TokenError::PermitExpired {
            deadline: Timestamp::new(1),
            now: Timestamp::new(2),
        };
        assert!(matches!(
            ProtocolError::from(expired),
            ProtocolError::PermitExpired { .. }
        ));
        assert_eq!(
            ProtocolError::from(TokenError::PermitReplay { nonce: 0, current: 1 }),
            ProtocolError::PermitReplay { nonce: 0, current: 1 }
        );
        assert_eq!(
            ProtocolError::from(TokenError::PermitNonceAhead { nonce: 5, current: 1 }),
            ProtocolError::InvalidSignature
        );
    }

    #[test]
    fn test_ledger_token_failures_are_allowance_errors() {
        let err = LedgerError::Token(TokenError::UnknownToken(Address::ZERO));
        assert!(matches!(ProtocolError::from(err), ProtocolError::Allowance(_)));
        assert!(matches!(
            ProtocolError::from(LedgerError::ZeroAmount),
            ProtocolError::Ledger(LedgerError::ZeroAmount)
        ));
    }
}
