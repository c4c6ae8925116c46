//! Transaction host: serializes calls against one [`Chain`], stages each call
//! and commits it only if every step and the ledger settlement succeed.

use crate::db::Repository;
use crate::domain::{Address, Amount, EventRecord, SwapInstruction, Timestamp};
use crate::ledger::LendingLedger;
use crate::protocol::{
    CloseReport, OpenPosition, OpenPositionWithPermit, OpenReport, PositionView, ProtocolError,
};
use crate::swap::SwapExecutor;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub mod chain;
pub mod staged;

pub use chain::Chain;
pub use staged::Staged;

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt<T> {
    pub tx_id: Uuid,
    pub label: String,
    pub block_time: Timestamp,
    pub value: T,
    pub events: Vec<EventRecord>,
}

/// Shared handle to the chain. Cloning shares the same state.
#[derive(Clone)]
pub struct Host<L, X> {
    chain: Arc<Mutex<Chain<L, X>>>,
    journal: Option<Repository>,
    wall_clock: bool,
}

impl<L: LendingLedger, X: SwapExecutor> Host<L, X> {
    pub fn new(chain: Chain<L, X>) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            journal: None,
            wall_clock: false,
        }
    }

    /// Append committed events to `journal`.
    pub fn with_journal(mut self, journal: Repository) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Advance the block clock to wall-clock time before every call.
    pub fn with_wall_clock(mut self) -> Self {
        self.wall_clock = true;
        self
    }

    /// Run `f` against a staged copy of the chain.
    ///
    /// The copy replaces the chain only if `f` and the ledger settlement both
    /// succeed; on any error nothing changes. Committed events are journaled
    /// while the chain is still locked, so journal order is commit order.
    pub async fn transact<T, F>(&self, label: &str, f: F) -> Result<TxReceipt<T>, ProtocolError>
    where
        F: FnOnce(&mut Chain<L, X>) -> Result<T, ProtocolError> + Send,
        T: Send,
    {
        let mut guard = self.chain.lock().await;
        let mut staged = Staged::begin(&mut *guard);
        if self.wall_clock {
            staged.set_block_time(Timestamp::now());
        }

        let outcome = f(&mut *staged).and_then(|value| {
            staged.settle()?;
            Ok(value)
        });
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                drop(staged);
                warn!(label, error = %err, "transaction reverted");
                return Err(err);
            }
        };

        let events = staged.take_events();
        let block_time = staged.block_time();
        staged.commit();

        let tx_id = Uuid::new_v4();
        let records: Vec<EventRecord> = events
            .into_iter()
            .enumerate()
            .map(|(seq, event)| EventRecord::new(tx_id, seq as u32, label, block_time, event))
            .collect();
        info!(%tx_id, label, events = records.len(), "transaction committed");

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.insert_events_batch(&records).await {
                warn!(%tx_id, error = %e, "failed to journal committed events");
            }
        }
        drop(guard);

        Ok(TxReceipt {
            tx_id,
            label: label.to_string(),
            block_time,
            value,
            events: records,
        })
    }

    /// Read the committed chain.
    pub async fn view<R>(&self, f: impl FnOnce(&Chain<L, X>) -> R) -> R {
        let guard = self.chain.lock().await;
        f(&*guard)
    }

    pub async fn block_time(&self) -> Timestamp {
        self.view(|chain| chain.block_time()).await
    }

    pub async fn set_block_time(&self, time: Timestamp) {
        self.chain.lock().await.set_block_time(time);
    }

    pub async fn deploy_factory(&self, address: Address) -> Result<TxReceipt<Address>, ProtocolError> {
        self.transact("deploy_factory", move |chain| chain.deploy_factory(address))
            .await
    }

    pub async fn approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: Amount,
    ) -> Result<TxReceipt<()>, ProtocolError> {
        self.transact("approve", move |chain| {
            chain.approve(&token, &owner, &spender, amount)
        })
        .await
    }

    pub async fn open_position(
        &self,
        factory: Address,
        caller: Address,
        request: OpenPosition,
    ) -> Result<TxReceipt<(Address, OpenReport)>, ProtocolError> {
        self.transact("open_position", move |chain| {
            chain.open_position(&factory, caller, &request)
        })
        .await
    }

    pub async fn open_position_with_permit(
        &self,
        factory: Address,
        caller: Address,
        request: OpenPositionWithPermit,
    ) -> Result<TxReceipt<(Address, OpenReport)>, ProtocolError> {
        self.transact("open_position_with_permit", move |chain| {
            chain.open_position_with_permit(&factory, caller, &request)
        })
        .await
    }

    pub async fn close_partial(
        &self,
        vault: Address,
        caller: Address,
        repay_amount: Amount,
        withdraw_amount: Amount,
        swap: SwapInstruction,
    ) -> Result<TxReceipt<CloseReport>, ProtocolError> {
        self.transact("close_partial", move |chain| {
            chain.close_partial(&vault, caller, repay_amount, withdraw_amount, &swap)
        })
        .await
    }

    pub async fn close_full(
        &self,
        vault: Address,
        caller: Address,
        swap: SwapInstruction,
    ) -> Result<TxReceipt<CloseReport>, ProtocolError> {
        self.transact("close_full", move |chain| chain.close_full(&vault, caller, &swap))
            .await
    }

    pub async fn next_address(&self, factory: &Address) -> Result<Address, ProtocolError> {
        self.view(|chain| chain.next_address(factory)).await
    }

    pub async fn list_positions(
        &self,
        owner: &Address,
        factory: &Address,
    ) -> Result<Vec<PositionView>, ProtocolError> {
        self.view(|chain| chain.list_positions(owner, factory)).await
    }
}

/// Read-only access to a running chain, object safe so the HTTP layer does
/// not depend on the ledger and executor types.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn block_time(&self) -> Timestamp;

    async fn next_address(&self, factory: &Address) -> Result<Address, ProtocolError>;

    async fn list_positions(
        &self,
        owner: &Address,
        factory: &Address,
    ) -> Result<Vec<PositionView>, ProtocolError>;
}

#[async_trait]
impl<L: LendingLedger, X: SwapExecutor> ChainReader for Host<L, X> {
    async fn block_time(&self) -> Timestamp {
        Host::block_time(self).await
    }

    async fn next_address(&self, factory: &Address) -> Result<Address, ProtocolError> {
        Host::next_address(self, factory).await
    }

    async fn list_positions(
        &self,
        owner: &Address,
        factory: &Address,
    ) -> Result<Vec<PositionView>, ProtocolError> {
        Host::list_positions(self, owner, factory).await
    }
}
