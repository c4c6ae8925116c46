//! Opaque swap instruction produced by off-chain route discovery.

use super::Amount;
use serde::{Deserialize, Serialize};

/// A swap route the core never interprets.
///
/// The executor decodes `payload`; the vault only uses the two bounds:
/// at most `amount_in` of the input asset may be pulled, and at least
/// `min_amount_out` of the output asset must arrive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstruction {
    #[serde(with = "hex_payload")]
    pub payload: Vec<u8>,
    pub amount_in: Amount,
    pub min_amount_out: Amount,
}

impl SwapInstruction {
    pub fn new(payload: Vec<u8>, amount_in: Amount, min_amount_out: Amount) -> Self {
        Self {
            payload,
            amount_in,
            min_amount_out,
        }
    }

    /// Replace the output bound, e.g. to tighten a quote before submission.
    pub fn with_min_amount_out(mut self, min_amount_out: Amount) -> Self {
        self.min_amount_out = min_amount_out;
        self
    }
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
