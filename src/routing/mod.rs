//! Off-chain route discovery.
//!
//! A [`RouteSource`] turns "swap X of A into B for this account" into an
//! opaque [`SwapInstruction`]. The protocol never interprets the result; it
//! only checks balances after execution.

use crate::domain::{Address, Amount, SwapInstruction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod aggregator;
pub mod mock;
pub mod planner;

pub use aggregator::AggregatorRouteSource;
pub use mock::MockRouteSource;
pub use planner::{
    plan_close_full, plan_close_partial, plan_open, plan_open_with_permit, ClosePartialPlan, OpenPlan,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub from_asset: Address,
    pub to_asset: Address,
    pub amount: Amount,
    /// Account that will hold the input and receive the output, usually a
    /// vault that may not exist yet.
    pub from_address: Address,
    pub slippage_bps: u32,
}

/// A quoted route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub instruction: SwapInstruction,
    /// Output the source expects before slippage.
    pub quoted_out: Amount,
}

#[async_trait]
pub trait RouteSource: Send + Sync + fmt::Debug {
    async fn route(&self, request: &RouteRequest) -> Result<Route, RouteError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("rate limited")]
    RateLimited,
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no route from {from} to {to}")]
    NoRoute { from: Address, to: Address },
    #[error("quote {quoted} does not cover {required}")]
    InsufficientQuote { quoted: Amount, required: Amount },
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}
