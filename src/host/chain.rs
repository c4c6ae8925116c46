//! The mutable world every transaction runs against.

use crate::domain::{Address, Amount, ProtocolEvent, SwapInstruction, Timestamp};
use crate::ledger::LendingLedger;
use crate::protocol::{
    list_positions, CloseReport, Env, Factory, OpenPosition, OpenPositionWithPermit, OpenReport,
    PositionView, ProtocolError, Vault, VaultRegistry,
};
use crate::swap::SwapExecutor;
use crate::token::TokenBook;
use std::collections::BTreeMap;
use tracing::debug;

/// Token book, lending ledger, swap executor, factories and vaults, plus the
/// block clock and the events raised by the call in progress.
#[derive(Debug, Clone)]
pub struct Chain<L, X> {
    pub tokens: TokenBook,
    pub ledger: L,
    pub executor: X,
    factories: BTreeMap<Address, Factory>,
    vaults: VaultRegistry,
    block_time: Timestamp,
    events: Vec<ProtocolEvent>,
}

impl<L: LendingLedger, X: SwapExecutor> Chain<L, X> {
    pub fn new(tokens: TokenBook, ledger: L, executor: X, block_time: Timestamp) -> Self {
        Self {
            tokens,
            ledger,
            executor,
            factories: BTreeMap::new(),
            vaults: VaultRegistry::new(),
            block_time,
            events: Vec::new(),
        }
    }

    pub fn block_time(&self) -> Timestamp {
        self.block_time
    }

    /// Move the clock to `time`. The clock never runs backwards.
    pub fn set_block_time(&mut self, time: Timestamp) {
        self.block_time = self.block_time.max(time);
    }

    pub fn factory(&self, address: &Address) -> Result<&Factory, ProtocolError> {
        self.factories
            .get(address)
            .ok_or(ProtocolError::UnknownFactory(*address))
    }

    pub fn vault(&self, address: &Address) -> Result<&Vault, ProtocolError> {
        self.vaults
            .get(address)
            .ok_or(ProtocolError::UnknownVault(*address))
    }

    pub fn vaults(&self) -> &VaultRegistry {
        &self.vaults
    }

    /// Events raised since the last [`take_events`](Self::take_events).
    pub fn pending_events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut self.events)
    }

    fn parts(&mut self) -> (Env<'_, L, X>, &mut BTreeMap<Address, Factory>, &mut VaultRegistry) {
        (
            Env {
                tokens: &mut self.tokens,
                ledger: &mut self.ledger,
                executor: &mut self.executor,
                events: &mut self.events,
                now: self.block_time,
            },
            &mut self.factories,
            &mut self.vaults,
        )
    }

    pub fn deploy_factory(&mut self, address: Address) -> Result<Address, ProtocolError> {
        if self.factories.contains_key(&address) || self.vaults.contains(&address) {
            return Err(ProtocolError::AllocationCollision { address, nonce: 0 });
        }
        self.factories.insert(address, Factory::new(address));
        self.events
            .push(ProtocolEvent::FactoryDeployed { factory: address });
        debug!(factory = %address, "factory deployed");
        Ok(address)
    }

    pub fn next_address(&self, factory: &Address) -> Result<Address, ProtocolError> {
        Ok(self.factory(factory)?.next_address())
    }

    pub fn predict_address(&self, factory: &Address, nonce: u64) -> Result<Address, ProtocolError> {
        Ok(self.factory(factory)?.predict_address(nonce))
    }

    /// Credit `amount` of `token` to `to`. Setup and faucet use only.
    pub fn mint(&mut self, token: &Address, to: &Address, amount: Amount) -> Result<(), ProtocolError> {
        Ok(self.tokens.mint(token, to, amount)?)
    }

    pub fn approve(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), ProtocolError> {
        Ok(self.tokens.approve(token, owner, spender, amount)?)
    }

    pub fn open_position(
        &mut self,
        factory: &Address,
        caller: Address,
        request: &OpenPosition,
    ) -> Result<(Address, OpenReport), ProtocolError> {
        let (mut env, factories, vaults) = self.parts();
        let factory = factories
            .get_mut(factory)
            .ok_or(ProtocolError::UnknownFactory(*factory))?;
        factory.open_position(&mut env, vaults, caller, request)
    }

    pub fn open_position_with_permit(
        &mut self,
        factory: &Address,
        caller: Address,
        request: &OpenPositionWithPermit,
    ) -> Result<(Address, OpenReport), ProtocolError> {
        let (mut env, factories, vaults) = self.parts();
        let factory = factories
            .get_mut(factory)
            .ok_or(ProtocolError::UnknownFactory(*factory))?;
        factory.open_position_with_permit(&mut env, vaults, caller, request)
    }

    pub fn close_partial(
        &mut self,
        vault: &Address,
        caller: Address,
        repay_amount: Amount,
        withdraw_amount: Amount,
        swap: &SwapInstruction,
    ) -> Result<CloseReport, ProtocolError> {
        let (mut env, _, vaults) = self.parts();
        vaults
            .get_mut(vault)?
            .close_partial(&mut env, caller, repay_amount, withdraw_amount, swap)
    }

    pub fn close_full(
        &mut self,
        vault: &Address,
        caller: Address,
        swap: &SwapInstruction,
    ) -> Result<CloseReport, ProtocolError> {
        let (mut env, _, vaults) = self.parts();
        vaults.get_mut(vault)?.close_full(&mut env, caller, swap)
    }

    pub fn list_positions(
        &self,
        owner: &Address,
        factory: &Address,
    ) -> Result<Vec<PositionView>, ProtocolError> {
        let factory = self.factory(factory)?;
        Ok(list_positions(owner, factory, &self.vaults, &self.ledger))
    }

    /// Apply the ledger's risk checks to everything the current call touched.
    pub fn settle(&mut self) -> Result<(), ProtocolError> {
        Ok(self.ledger.settle()?)
    }
}
