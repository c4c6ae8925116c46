//! Keccak helpers shared by address derivation and permit digests.

use super::{Address, Amount};
use sha3::{Digest, Keccak256};

pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Left-pad an address into a 32-byte word.
pub fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Big-endian 32-byte word for an unsigned integer.
pub fn u64_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn i64_word(value: i64) -> [u8; 32] {
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut word = [fill; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Amounts are decimal, so they are committed by hashing their canonical
/// string form (the typed-data encoding for dynamic values).
pub fn amount_word(amount: &Amount) -> [u8; 32] {
    keccak256(&[amount.to_canonical_string().as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_parts_are_concatenated() {
        assert_eq!(keccak256(&[b"ab", b"c"]), keccak256(&[b"abc"]));
    }

    #[test]
    fn test_words() {
        let addr = Address::new([0x11; 20]);
        let word = address_word(&addr);
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], &[0x11; 20]);
        assert_eq!(u64_word(1)[31], 1);
        assert_eq!(i64_word(-1), [0xff; 32]);
    }

    #[test]
    fn test_amount_word_ignores_trailing_zeros() {
        let a = Amount::from_str_canonical("1.50").unwrap();
        let b = Amount::from_str_canonical("1.5").unwrap();
        assert_eq!(amount_word(&a), amount_word(&b));
    }
}
