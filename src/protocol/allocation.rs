//! Deterministic vault allocation.
//!
//! A vault's address is a pure function of the allocating factory, the
//! factory's nonce at deployment time and the hash of the vault template,
//! laid out like CREATE2: `keccak256(0xff ++ allocator ++ salt ++ template)[12..]`.

use crate::domain::hashing::{keccak256, u64_word};
use crate::domain::Address;
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Identifies the vault code every factory deploys.
pub const VAULT_TEMPLATE: &[u8] = b"leverslot/vault/v1";

pub fn vault_template_hash() -> [u8; 32] {
    keccak256(&[VAULT_TEMPLATE])
}

pub fn salt_for_nonce(nonce: u64) -> [u8; 32] {
    u64_word(nonce)
}

pub fn derive_address(allocator: &Address, nonce: u64, template_hash: &[u8; 32]) -> Address {
    Address::from_hash(&keccak256(&[
        &[0xff],
        allocator.as_bytes(),
        &salt_for_nonce(nonce),
        template_hash,
    ]))
}

/// Per-factory nonce. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationCounter(u64);

impl AllocationCounter {
    pub fn new() -> Self {
        Self(0)
    }

    /// Nonce the next deployment will use.
    pub fn current(&self) -> u64 {
        self.0
    }

    /// Take the current nonce and advance past it.
    pub fn claim(&mut self) -> Result<u64, ProtocolError> {
        let nonce = self.0;
        self.0 = nonce.checked_add(1).ok_or(ProtocolError::Overflow)?;
        Ok(nonce)
    }
}
