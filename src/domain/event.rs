//! Protocol events emitted by committed transactions.

use crate::domain::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something observable that a committed call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProtocolEvent {
    #[serde(rename_all = "camelCase")]
    FactoryDeployed { factory: Address },
    #[serde(rename_all = "camelCase")]
    VaultDeployed {
        factory: Address,
        vault: Address,
        owner: Address,
        nonce: u64,
    },
    #[serde(rename_all = "camelCase")]
    PermitConsumed {
        token: Address,
        owner: Address,
        spender: Address,
        nonce: u64,
    },
    #[serde(rename_all = "camelCase")]
    PositionOpened {
        vault: Address,
        owner: Address,
        deposit: Amount,
        borrowed: Amount,
        swap_output: Amount,
        collateral_balance: Amount,
        debt_balance: Amount,
    },
    #[serde(rename_all = "camelCase")]
    PositionReduced {
        vault: Address,
        owner: Address,
        repaid: Amount,
        withdrawn: Amount,
        collateral_balance: Amount,
        debt_balance: Amount,
    },
    #[serde(rename_all = "camelCase")]
    PositionClosed {
        vault: Address,
        owner: Address,
        repaid: Amount,
        withdrawn: Amount,
    },
}

impl ProtocolEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolEvent::FactoryDeployed { .. } => "factoryDeployed",
            ProtocolEvent::VaultDeployed { .. } => "vaultDeployed",
            ProtocolEvent::PermitConsumed { .. } => "permitConsumed",
            ProtocolEvent::PositionOpened { .. } => "positionOpened",
            ProtocolEvent::PositionReduced { .. } => "positionReduced",
            ProtocolEvent::PositionClosed { .. } => "positionClosed",
        }
    }

    pub fn vault(&self) -> Option<Address> {
        match self {
            ProtocolEvent::VaultDeployed { vault, .. }
            | ProtocolEvent::PositionOpened { vault, .. }
            | ProtocolEvent::PositionReduced { vault, .. }
            | ProtocolEvent::PositionClosed { vault, .. } => Some(*vault),
            ProtocolEvent::PermitConsumed { spender, .. } => Some(*spender),
            ProtocolEvent::FactoryDeployed { .. } => None,
        }
    }

    pub fn owner(&self) -> Option<Address> {
        match self {
            ProtocolEvent::VaultDeployed { owner, .. }
            | ProtocolEvent::PermitConsumed { owner, .. }
            | ProtocolEvent::PositionOpened { owner, .. }
            | ProtocolEvent::PositionReduced { owner, .. }
            | ProtocolEvent::PositionClosed { owner, .. } => Some(*owner),
            ProtocolEvent::FactoryDeployed { .. } => None,
        }
    }
}

/// An event together with the transaction that committed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Stable unique identifier: hash of (tx_id, seq, kind).
    pub event_key: String,
    pub tx_id: Uuid,
    pub seq: u32,
    pub label: String,
    pub block_time: Timestamp,
    pub event: ProtocolEvent,
}

impl EventRecord {
    pub fn new(
        tx_id: Uuid,
        seq: u32,
        label: &str,
        block_time: Timestamp,
        event: ProtocolEvent,
    ) -> Self {
        let event_key = Self::compute_event_key(&tx_id, seq, event.kind());
        Self {
            event_key,
            tx_id,
            seq,
            label: label.to_string(),
            block_time,
            event,
        }
    }

    /// 128-bit truncated SHA-256 over the record's identity fields.
    pub fn compute_event_key(tx_id: &Uuid, seq: u32, kind: &str) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(tx_id.as_bytes());
        hasher.update(seq.to_le_bytes());
        hasher.update((kind.len() as u32).to_le_bytes());
        hasher.update(kind.as_bytes());
        let hash = hasher.finalize();
        format!("ev:{}", hex::encode(&hash[..16]))
    }
}
