//! Pre-seeded chain for the server binary, demos and tests: two stablecoins,
//! a funded lending ledger and a 1:1 router.

use crate::domain::{Address, Amount, Timestamp};
use crate::host::Chain;
use crate::ledger::{LendingLedger, MemoryLedger, ReserveConfig};
use crate::protocol::ProtocolError;
use crate::swap::{MockSwapExecutor, SwapExecutor};
use crate::token::TokenBook;
use rust_decimal::Decimal;

pub type SandboxChain = Chain<MemoryLedger, MockSwapExecutor>;

/// Tokens of ledger liquidity and router inventory per asset.
pub const SANDBOX_LIQUIDITY: u64 = 1_000_000;

/// Loan-to-value of both sandbox reserves.
pub fn sandbox_ltv() -> Decimal {
    Decimal::new(98, 2)
}

pub struct Sandbox {
    pub chain: SandboxChain,
    /// Permit-capable collateral token.
    pub usdc: Address,
    pub usdt: Address,
    pub ledger: Address,
    pub router: Address,
}

impl Sandbox {
    pub fn build(chain_id: u64, block_time: Timestamp) -> Result<Self, ProtocolError> {
        let usdc = Address::from_label("sandbox/usdc");
        let usdt = Address::from_label("sandbox/usdt");
        let mut tokens = TokenBook::new(chain_id);
        tokens.register(usdc, "USDC", "USD Coin", true)?;
        tokens.register(usdt, "USDT", "Tether USD", false)?;

        let mut ledger = MemoryLedger::new(Address::from_label("sandbox/ledger"));
        let config = ReserveConfig::new(Decimal::ONE, sandbox_ltv());
        ledger.list_reserve(usdc, config)?;
        ledger.list_reserve(usdt, config)?;

        let router = MockSwapExecutor::new(Address::from_label("sandbox/router"))
            .with_rate(usdt, usdc, Decimal::ONE)
            .with_rate(usdc, usdt, Decimal::ONE);

        let liquidity = Amount::from(SANDBOX_LIQUIDITY);
        let provider = Address::from_label("sandbox/liquidity-provider");
        for asset in [usdc, usdt] {
            tokens.mint(&asset, &provider, liquidity)?;
            ledger.supply(&mut tokens, provider, asset, liquidity, provider)?;
            tokens.mint(&asset, &router.address(), liquidity)?;
        }
        ledger.settle()?;

        let ledger_address = ledger.address();
        let router_address = router.address();
        Ok(Self {
            chain: Chain::new(tokens, ledger, router, block_time),
            usdc,
            usdt,
            ledger: ledger_address,
            router: router_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_is_funded() {
        let sandbox = Sandbox::build(1, Timestamp::new(0)).unwrap();
        let chain = &sandbox.chain;
        let liquidity = Amount::from(SANDBOX_LIQUIDITY);
        assert_eq!(chain.tokens.balance_of(&sandbox.usdt, &sandbox.ledger), liquidity);
        assert_eq!(chain.tokens.balance_of(&sandbox.usdc, &sandbox.router), liquidity);
        assert!(chain.tokens.domain(&sandbox.usdc).is_ok());
        assert!(chain.tokens.domain(&sandbox.usdt).is_err());
        assert!(chain.pending_events().is_empty());
    }
}
