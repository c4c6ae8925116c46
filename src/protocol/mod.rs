//! Factory/vault protocol: deterministic allocation, leveraged open, and
//! partial or full unwinding of a position.
//!
//! Every operation here mutates the world it is handed through [`Env`] and
//! returns an error on the first failed step. Atomicity comes from the caller:
//! the host runs each call against a staged copy and drops it on error.

use crate::domain::{ProtocolEvent, Timestamp};
use crate::ledger::LendingLedger;
use crate::swap::SwapExecutor;
use crate::token::TokenBook;

pub mod allocation;
pub mod error;
pub mod factory;
pub mod lens;
pub mod vault;

pub use allocation::{derive_address, vault_template_hash, AllocationCounter};
pub use error::ProtocolError;
pub use factory::{Factory, OpenPosition, OpenPositionWithPermit, VaultRegistry};
pub use lens::{list_positions, PositionView};
pub use vault::{CloseReport, OpenReport, Vault, VaultState};

/// Mutable view of the collaborators one call may touch.
pub struct Env<'a, L, X> {
    pub tokens: &'a mut TokenBook,
    pub ledger: &'a mut L,
    pub executor: &'a mut X,
    pub events: &'a mut Vec<ProtocolEvent>,
    /// Block time of the call.
    pub now: Timestamp,
}

impl<'a, L: LendingLedger, X: SwapExecutor> Env<'a, L, X> {
    pub fn emit(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }
}
