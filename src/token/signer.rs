//! secp256k1 keys for signing and verifying permits.

use crate::domain::hashing::keccak256;
use crate::domain::{
    Address, Amount, PermitAuthorization, PermitDomain, PermitSignature, Timestamp,
};
use libsecp256k1::{Message, PublicKey, RecoveryId, SecretKey, Signature};
use std::fmt;

use super::TokenError;

/// Account address of a public key: last 20 bytes of keccak(x || y).
pub fn address_of(public_key: &PublicKey) -> Address {
    let serialized = public_key.serialize();
    Address::from_hash(&keccak256(&[&serialized[1..]]))
}

/// Recover the signing address of `digest`.
pub fn recover_signer(digest: &[u8; 32], signature: &PermitSignature) -> Result<Address, TokenError> {
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let sig = Signature::parse_standard(&rs).map_err(|_| TokenError::InvalidSignature)?;
    let v = signature.v.checked_sub(27).unwrap_or(signature.v);
    let recovery_id = RecoveryId::parse(v).map_err(|_| TokenError::InvalidSignature)?;
    let message = Message::parse(digest);
    let public_key =
        libsecp256k1::recover(&message, &sig, &recovery_id).map_err(|_| TokenError::InvalidSignature)?;
    Ok(address_of(&public_key))
}

/// An account's signing key.
#[derive(Clone)]
pub struct Signer {
    secret: SecretKey,
    address: Address,
}

impl Signer {
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self, TokenError> {
        let secret = SecretKey::parse(secret).map_err(|_| TokenError::InvalidKey)?;
        let address = address_of(&PublicKey::from_secret_key(&secret));
        Ok(Self { secret, address })
    }

    /// Derive a key from a seed phrase (sandbox and test accounts).
    pub fn from_seed(seed: &str) -> Result<Self, TokenError> {
        Self::from_bytes(&keccak256(&[b"leverslot.signer", seed.as_bytes()]))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_digest(&self, digest: &[u8; 32]) -> PermitSignature {
        let (signature, recovery_id) = libsecp256k1::sign(&Message::parse(digest), &self.secret);
        let bytes = signature.serialize();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        PermitSignature {
            r,
            s,
            v: recovery_id.serialize() + 27,
        }
    }

    /// Sign a permit granting `spender` an allowance of `value`.
    pub fn sign_permit(
        &self,
        domain: &PermitDomain,
        spender: Address,
        value: Amount,
        nonce: u64,
        deadline: Timestamp,
    ) -> PermitAuthorization {
        let digest = domain.digest(&self.address, &spender, &value, nonce, deadline);
        PermitAuthorization {
            token: domain.verifying_token,
            owner: self.address,
            spender,
            value,
            nonce,
            deadline,
            signature: self.sign_digest(&digest),
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> PermitDomain {
        PermitDomain {
            name: "USD Coin".to_string(),
            version: "1".to_string(),
            chain_id: 1,
            verifying_token: Address::from_label("usdc"),
        }
    }

    #[test]
    fn test_seeded_signers_are_deterministic() {
        let a = Signer::from_seed("alice").unwrap();
        let b = Signer::from_seed("alice").unwrap();
        let c = Signer::from_seed("bob").unwrap();
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = Signer::from_seed("alice").unwrap();
        let digest = keccak256(&[b"hello"]);
        let sig = signer.sign_digest(&digest);
        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(recover_signer(&digest, &sig).unwrap(), signer.address());
    }

    #[test]
    fn test_recovery_over_other_digest_yields_other_address() {
        let signer = Signer::from_seed("alice").unwrap();
        let sig = signer.sign_digest(&keccak256(&[b"hello"]));
        let other = recover_signer(&keccak256(&[b"world"]), &sig);
        assert_ne!(other.ok(), Some(signer.address()));
    }

    #[test]
    fn test_signed_permit_recovers_to_owner() {
        let signer = Signer::from_seed("alice").unwrap();
        let spender = Address::from_label("vault");
        let permit = signer.sign_permit(&domain(), spender, Amount::from(5), 0, Timestamp::new(10));
        assert_eq!(permit.owner, signer.address());
        assert_eq!(permit.token, Address::from_label("usdc"));
        let recovered = recover_signer(&permit.digest(&domain()), &permit.signature).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_garbage_signature_is_rejected() {
        let sig = PermitSignature {
            r: [0u8; 32],
            s: [0u8; 32],
            v: 27,
        };
        assert_eq!(
            recover_signer(&keccak256(&[b"x"]), &sig),
            Err(TokenError::InvalidSignature)
        );
    }
}
