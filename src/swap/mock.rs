//! Fixed-rate router for tests and the sandbox.

use super::{SwapError, SwapExecutor};
use crate::domain::{Address, Amount, SwapInstruction};
use crate::token::TokenBook;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Payload format understood by [`MockSwapExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRoute {
    pub from_asset: Address,
    pub to_asset: Address,
}

impl MockRoute {
    pub fn new(from_asset: Address, to_asset: Address) -> Self {
        Self {
            from_asset,
            to_asset,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        // Serializing two addresses cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, SwapError> {
        serde_json::from_slice(payload).map_err(|e| SwapError::MalformedPayload(e.to_string()))
    }
}

/// Router converting at fixed rates out of its own token reserves.
///
/// `haircut_bps` makes it deliver less than it reports, the way a
/// fee-on-transfer token or a dishonest route would.
#[derive(Debug, Clone)]
pub struct MockSwapExecutor {
    address: Address,
    rates: HashMap<(Address, Address), Decimal>,
    haircut_bps: u32,
}

impl MockSwapExecutor {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            rates: HashMap::new(),
            haircut_bps: 0,
        }
    }

    /// Quote `to` per unit of `from`.
    pub fn with_rate(mut self, from: Address, to: Address, rate: Decimal) -> Self {
        self.set_rate(from, to, rate);
        self
    }

    pub fn set_rate(&mut self, from: Address, to: Address, rate: Decimal) {
        self.rates.insert((from, to), rate);
    }

    pub fn set_haircut_bps(&mut self, bps: u32) {
        self.haircut_bps = bps.min(10_000);
    }

    pub fn quote(&self, from: Address, to: Address, amount_in: Amount) -> Result<Amount, SwapError> {
        let rate = self
            .rates
            .get(&(from, to))
            .ok_or(SwapError::UnsupportedPair { from, to })?;
        amount_in.checked_mul(*rate).ok_or(SwapError::Overflow)
    }

    /// Build an instruction this router can execute.
    pub fn instruction(
        from: Address,
        to: Address,
        amount_in: Amount,
        min_amount_out: Amount,
    ) -> SwapInstruction {
        SwapInstruction::new(MockRoute::new(from, to).encode(), amount_in, min_amount_out)
    }
}

impl SwapExecutor for MockSwapExecutor {
    fn address(&self) -> Address {
        self.address
    }

    fn execute(
        &mut self,
        tokens: &mut TokenBook,
        caller: Address,
        instruction: &SwapInstruction,
    ) -> Result<Amount, SwapError> {
        let route = MockRoute::decode(&instruction.payload)?;
        let quoted = self.quote(route.from_asset, route.to_asset, instruction.amount_in)?;
        let delivered = quoted
            .less_bps(self.haircut_bps)
            .ok_or(SwapError::Overflow)?;

        let available = tokens.balance_of(&route.to_asset, &self.address);
        if available < delivered {
            return Err(SwapError::InsufficientReserves {
                asset: route.to_asset,
                available,
                required: delivered,
            });
        }

        tokens.transfer_from(
            &route.from_asset,
            &self.address,
            &caller,
            &self.address,
            instruction.amount_in,
        )?;
        tokens.transfer(&route.to_asset, &self.address, &caller, delivered)?;
        debug!(
            from = %route.from_asset,
            to = %route.to_asset,
            amount_in = %instruction.amount_in,
            %delivered,
            "mock swap"
        );
        Ok(quoted)
    }
}
