//! Route source backed by a [`MockSwapExecutor`]'s fixed rates.

use super::{Route, RouteError, RouteRequest, RouteSource};
use crate::swap::MockSwapExecutor;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MockRouteSource {
    executor: MockSwapExecutor,
    calls: Arc<AtomicUsize>,
}

impl MockRouteSource {
    pub fn new(executor: MockSwapExecutor) -> Self {
        Self {
            executor,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of routes served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteSource for MockRouteSource {
    async fn route(&self, request: &RouteRequest) -> Result<Route, RouteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let quoted_out = self
            .executor
            .quote(request.from_asset, request.to_asset, request.amount)
            .map_err(|_| RouteError::NoRoute {
                from: request.from_asset,
                to: request.to_asset,
            })?;
        let min_amount_out = quoted_out
            .less_bps(request.slippage_bps)
            .ok_or_else(|| RouteError::InvalidPlan("slippage above 100%".to_string()))?;
        Ok(Route {
            instruction: MockSwapExecutor::instruction(
                request.from_asset,
                request.to_asset,
                request.amount,
                min_amount_out,
            ),
            quoted_out,
        })
    }
}
