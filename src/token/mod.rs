//! In-memory token book: balances, allowances and permit nonces for every
//! registered token.

use crate::domain::{Address, Amount, PermitAuthorization, PermitDomain, Timestamp};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

pub mod signer;

pub use signer::{recover_signer, Signer};

/// Version string of every token's permit domain.
pub const PERMIT_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("unknown token {0}")]
    UnknownToken(Address),
    #[error("token {token} already registered")]
    AlreadyRegistered { token: Address },
    #[error("{holder} holds {available} of {token}, needs {required}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        available: Amount,
        required: Amount,
    },
    #[error("{spender} may move {allowed} of {token} from {owner}, needs {required}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        allowed: Amount,
        required: Amount,
    },
    #[error("token {0} does not support permits")]
    PermitUnsupported(Address),
    #[error("permit expired at {deadline}, now {now}")]
    PermitExpired { deadline: Timestamp, now: Timestamp },
    #[error("permit nonce {nonce} already consumed (current {current})")]
    PermitReplay { nonce: u64, current: u64 },
    #[error("permit nonce {nonce} is ahead of current {current}")]
    PermitNonceAhead { nonce: u64, current: u64 },
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid signing key")]
    InvalidKey,
    #[error("amount overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub permit_enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TokenBook {
    chain_id: u64,
    tokens: BTreeMap<Address, TokenInfo>,
    balances: HashMap<(Address, Address), Amount>,
    allowances: HashMap<(Address, Address, Address), Amount>,
    nonces: HashMap<(Address, Address), u64>,
}

impl TokenBook {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn register(
        &mut self,
        token: Address,
        symbol: &str,
        name: &str,
        permit_enabled: bool,
    ) -> Result<(), TokenError> {
        if self.tokens.contains_key(&token) {
            return Err(TokenError::AlreadyRegistered { token });
        }
        self.tokens.insert(
            token,
            TokenInfo {
                symbol: symbol.to_string(),
                name: name.to_string(),
                permit_enabled,
            },
        );
        Ok(())
    }

    pub fn info(&self, token: &Address) -> Result<&TokenInfo, TokenError> {
        self.tokens
            .get(token)
            .ok_or(TokenError::UnknownToken(*token))
    }

    /// Signing domain of a permit-capable token.
    pub fn domain(&self, token: &Address) -> Result<PermitDomain, TokenError> {
        let info = self.info(token)?;
        if !info.permit_enabled {
            return Err(TokenError::PermitUnsupported(*token));
        }
        Ok(PermitDomain {
            name: info.name.clone(),
            version: PERMIT_VERSION.to_string(),
            chain_id: self.chain_id,
            verifying_token: *token,
        })
    }

    pub fn balance_of(&self, token: &Address, holder: &Address) -> Amount {
        self.balances
            .get(&(*token, *holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    /// Current permit nonce of `owner` on `token`.
    pub fn nonce(&self, token: &Address, owner: &Address) -> u64 {
        self.nonces.get(&(*token, *owner)).copied().unwrap_or(0)
    }

    pub fn mint(&mut self, token: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        self.info(token)?;
        let balance = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert((*token, *to), balance);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.info(token)?;
        if amount.is_zero() || from == to {
            return Ok(());
        }
        let available = self.balance_of(token, from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                token: *token,
                holder: *from,
                available,
                required: amount,
            })?;
        let credited = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert((*token, *from), remaining);
        self.balances.insert((*token, *to), credited);
        debug!(%token, %from, %to, %amount, "transfer");
        Ok(())
    }

    pub fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.info(token)?;
        self.allowances.insert((*token, *owner, *spender), amount);
        Ok(())
    }

    /// Move `amount` from `owner` to `to`, spending `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(token, owner, spender);
        let remaining = allowed
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                token: *token,
                owner: *owner,
                spender: *spender,
                allowed,
                required: amount,
            })?;
        self.transfer(token, owner, to, amount)?;
        self.allowances.insert((*token, *owner, *spender), remaining);
        Ok(())
    }

    /// Redeem a signed permit: set the allowance and consume the owner's nonce.
    pub fn permit(&mut self, permit: &PermitAuthorization, now: Timestamp) -> Result<(), TokenError> {
        let token = permit.token;
        let domain = self.domain(&token)?;
        if permit.is_expired(now) {
            return Err(TokenError::PermitExpired {
                deadline: permit.deadline,
                now,
            });
        }
        let current = self.nonce(&token, &permit.owner);
        if permit.nonce < current {
            return Err(TokenError::PermitReplay {
                nonce: permit.nonce,
                current,
            });
        }
        if permit.nonce > current {
            return Err(TokenError::PermitNonceAhead {
                nonce: permit.nonce,
                current,
            });
        }
        let signer = recover_signer(&permit.digest(&domain), &permit.signature)?;
        if signer != permit.owner {
            return Err(TokenError::InvalidSignature);
        }

        self.allowances
            .insert((token, permit.owner, permit.spender), permit.value);
        self.nonces.insert((token, permit.owner), current + 1);
        debug!(%token, owner = %permit.owner, spender = %permit.spender, nonce = current, "permit consumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(s: &str) -> Amount {
        Amount::from_str_canonical(s).unwrap()
    }

    fn book() -> (TokenBook, Address) {
        let mut book = TokenBook::new(1);
        let usdc = Address::from_label("usdc");
        book.register(usdc, "USDC", "USD Coin", true).unwrap();
        (book, usdc)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let (mut book, usdc) = book();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        book.mint(&usdc, &alice, a("10")).unwrap();
        book.transfer(&usdc, &alice, &bob, a("4")).unwrap();
        assert_eq!(book.balance_of(&usdc, &alice), a("6"));
        assert_eq!(book.balance_of(&usdc, &bob), a("4"));
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let (mut book, usdc) = book();
        let alice = Address::from_label("alice");
        let err = book
            .transfer(&usdc, &alice, &Address::from_label("bob"), a("1"))
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_unknown_token() {
        let (mut book, _) = book();
        let other = Address::from_label("other");
        assert_eq!(
            book.mint(&other, &Address::from_label("alice"), a("1")),
            Err(TokenError::UnknownToken(other))
        );
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let (mut book, usdc) = book();
        let alice = Address::from_label("alice");
        let vault = Address::from_label("vault");
        book.mint(&usdc, &alice, a("10")).unwrap();
        book.approve(&usdc, &alice, &vault, a("3")).unwrap();

        book.transfer_from(&usdc, &vault, &alice, &vault, a("2")).unwrap();
        assert_eq!(book.allowance(&usdc, &alice, &vault), a("1"));
        assert_eq!(book.balance_of(&usdc, &vault), a("2"));

        let err = book
            .transfer_from(&usdc, &vault, &alice, &vault, a("2"))
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_permit_sets_allowance_and_advances_nonce() {
        let (mut book, usdc) = book();
        let signer = Signer::from_seed("alice").unwrap();
        let spender = Address::from_label("vault");
        let domain = book.domain(&usdc).unwrap();
        let permit = signer.sign_permit(&domain, spender, a("5"), 0, Timestamp::new(100));

        book.permit(&permit, Timestamp::new(50)).unwrap();
        assert_eq!(book.allowance(&usdc, &signer.address(), &spender), a("5"));
        assert_eq!(book.nonce(&usdc, &signer.address()), 1);

        assert_eq!(
            book.permit(&permit, Timestamp::new(50)),
            Err(TokenError::PermitReplay {
                nonce: 0,
                current: 1
            })
        );
    }

    #[test]
    fn test_permit_rejects_expired() {
        let (mut book, usdc) = book();
        let signer = Signer::from_seed("alice").unwrap();
        let domain = book.domain(&usdc).unwrap();
        let permit = signer.sign_permit(
            &domain,
            Address::from_label("vault"),
            a("5"),
            0,
            Timestamp::new(100),
        );
        assert!(matches!(
            book.permit(&permit, Timestamp::new(101)),
            Err(TokenError::PermitExpired { .. })
        ));
        assert_eq!(book.nonce(&usdc, &signer.address()), 0);
    }

    #[test]
    fn test_permit_rejects_tampered_value() {
        let (mut book, usdc) = book();
        let signer = Signer::from_seed("alice").unwrap();
        let domain = book.domain(&usdc).unwrap();
        let mut permit = signer.sign_permit(
            &domain,
            Address::from_label("vault"),
            a("5"),
            0,
            Timestamp::new(100),
        );
        permit.value = a("500");
        assert_eq!(
            book.permit(&permit, Timestamp::new(1)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_permit_unsupported_token() {
        let mut book = TokenBook::new(1);
        let plain = Address::from_label("plain");
        book.register(plain, "PLN", "Plain", false).unwrap();
        assert_eq!(book.domain(&plain), Err(TokenError::PermitUnsupported(plain)));
    }
}
