//! Signed allowance grants (typed-data permits).

use super::hashing::{address_word, amount_word, i64_word, keccak256, u64_word};
use super::{Address, Amount, Timestamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const PERMIT_TYPE: &[u8] =
    b"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

/// Signing domain of one permit-capable token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_token: Address,
}

impl PermitDomain {
    pub fn separator(&self) -> [u8; 32] {
        keccak256(&[
            &keccak256(&[DOMAIN_TYPE]),
            &keccak256(&[self.name.as_bytes()]),
            &keccak256(&[self.version.as_bytes()]),
            &u64_word(self.chain_id),
            &address_word(&self.verifying_token),
        ])
    }

    /// Digest the owner signs to grant `spender` an allowance of `value`.
    pub fn digest(
        &self,
        owner: &Address,
        spender: &Address,
        value: &Amount,
        nonce: u64,
        deadline: Timestamp,
    ) -> [u8; 32] {
        let struct_hash = keccak256(&[
            &keccak256(&[PERMIT_TYPE]),
            &address_word(owner),
            &address_word(spender),
            &amount_word(value),
            &u64_word(nonce),
            &i64_word(deadline.as_secs()),
        ]);
        keccak256(&[b"\x19\x01", &self.separator(), &struct_hash])
    }
}

/// Recoverable secp256k1 signature in (r, s, v) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl PermitSignature {
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 65 {
            return None;
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Some(Self { r, s, v: bytes[64] })
    }
}

impl Serialize for PermitSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.to_bytes())))
    }
}

impl<'de> Deserialize<'de> for PermitSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)?;
        PermitSignature::from_bytes(&raw)
            .ok_or_else(|| serde::de::Error::custom("signature must be 65 bytes"))
    }
}

/// Single-use allowance grant from `owner` to `spender` on `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitAuthorization {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub value: Amount,
    pub nonce: u64,
    pub deadline: Timestamp,
    pub signature: PermitSignature,
}

impl PermitAuthorization {
    pub fn digest(&self, domain: &PermitDomain) -> [u8; 32] {
        domain.digest(
            &self.owner,
            &self.spender,
            &self.value,
            self.nonce,
            self.deadline,
        )
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.deadline
    }
}
