pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod host;
pub mod ledger;
pub mod protocol;
pub mod routing;
pub mod sandbox;
pub mod swap;
pub mod token;

pub use config::Config;
pub use db::Repository;
pub use domain::{
    Address, Amount, EventRecord, PermitAuthorization, ProtocolEvent, SwapInstruction, Timestamp,
};
pub use error::AppError;
pub use host::{ChainReader, Host, TxReceipt};
pub use ledger::{LendingLedger, MemoryLedger};
pub use protocol::{
    Factory, OpenPosition, OpenPositionWithPermit, PositionView, ProtocolError, Vault, VaultState,
};
pub use sandbox::Sandbox;
pub use swap::{MockSwapExecutor, SwapExecutor};
