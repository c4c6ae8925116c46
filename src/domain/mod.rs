//! Domain types shared by the protocol, its collaborators and the read API.
//!
//! This module provides:
//! - Lossless, non-negative token amounts
//! - Addresses and block timestamps
//! - Opaque swap instructions and signed permits
//! - Protocol events and their journal records

pub mod amount;
pub mod event;
pub mod hashing;
pub mod instruction;
pub mod permit;
pub mod primitives;

pub use amount::{Amount, AmountError};
pub use event::{EventRecord, ProtocolEvent};
pub use instruction::SwapInstruction;
pub use permit::{PermitAuthorization, PermitDomain, PermitSignature};
pub use primitives::{Address, AddressParseError, Timestamp};
