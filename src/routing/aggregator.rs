//! DEX aggregator client (`/swap` endpoint, 1inch v5 style).

use super::{Route, RouteError, RouteRequest, RouteSource};
use crate::domain::{Address, Amount, SwapInstruction};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ROUTE_API_URL: &str = "https://api.1inch.io/v5.0";

const DEFAULT_DECIMALS: u32 = 18;

#[derive(Debug, Clone)]
pub struct AggregatorRouteSource {
    client: Client,
    base_url: String,
    chain_id: u64,
    decimals: HashMap<Address, u32>,
}

impl AggregatorRouteSource {
    pub fn new(base_url: String, chain_id: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id,
            decimals: HashMap::new(),
        }
    }

    /// Register the on-chain decimals of `token` (18 if unknown).
    pub fn with_decimals(mut self, token: Address, decimals: u32) -> Self {
        self.decimals.insert(token, decimals);
        self
    }

    fn decimals_of(&self, token: &Address) -> u32 {
        self.decimals.get(token).copied().unwrap_or(DEFAULT_DECIMALS)
    }

    pub fn swap_url(&self, request: &RouteRequest) -> Result<String, RouteError> {
        let amount = to_base_units(&request.amount, self.decimals_of(&request.from_asset))?;
        let slippage = Decimal::from(request.slippage_bps) / Decimal::from(100);
        Ok(format!(
            "{}/{}/swap?fromTokenAddress={}&toTokenAddress={}&amount={}&fromAddress={}&slippage={}&destReceiver={}&disableEstimate=true&allowPartialFill=false",
            self.base_url,
            self.chain_id,
            request.from_asset,
            request.to_asset,
            amount,
            request.from_address,
            slippage.normalize(),
            request.from_address,
        ))
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, RouteError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(RouteError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(RouteError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(RouteError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(RouteError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(RouteError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl RouteSource for AggregatorRouteSource {
    async fn route(&self, request: &RouteRequest) -> Result<Route, RouteError> {
        let url = self.swap_url(request)?;
        debug!(
            from = %request.from_asset,
            to = %request.to_asset,
            amount = %request.amount,
            "requesting aggregator route"
        );
        let response = self.get_json(&url).await?;
        parse_swap_response(&response, request, self.decimals_of(&request.to_asset))
    }
}

/// Build a route from a `/swap` response body.
pub fn parse_swap_response(
    response: &serde_json::Value,
    request: &RouteRequest,
    to_decimals: u32,
) -> Result<Route, RouteError> {
    let raw_out = response
        .get("toAmount")
        .or_else(|| response.get("toTokenAmount"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| RouteError::Parse("missing toAmount".to_string()))?;
    let quoted_out = from_base_units(raw_out, to_decimals)?;

    let data = response
        .get("tx")
        .and_then(|tx| tx.get("data"))
        .and_then(|d| d.as_str())
        .ok_or_else(|| RouteError::Parse("missing tx.data".to_string()))?;
    let payload = hex::decode(data.strip_prefix("0x").unwrap_or(data))
        .map_err(|e| RouteError::Parse(format!("tx.data: {}", e)))?;

    let min_amount_out = quoted_out
        .less_bps(request.slippage_bps)
        .ok_or_else(|| RouteError::InvalidPlan("slippage above 100%".to_string()))?;
    Ok(Route {
        instruction: SwapInstruction::new(payload, request.amount, min_amount_out),
        quoted_out,
    })
}

fn scale(decimals: u32) -> Result<Decimal, RouteError> {
    10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| RouteError::InvalidPlan(format!("unsupported decimals {}", decimals)))
}

/// Integer string of the smallest token unit, truncating sub-unit dust.
fn to_base_units(amount: &Amount, decimals: u32) -> Result<String, RouteError> {
    let scaled = amount
        .inner()
        .checked_mul(scale(decimals)?)
        .ok_or_else(|| RouteError::InvalidPlan("amount overflow".to_string()))?;
    Ok(scaled.trunc().normalize().to_string())
}

fn from_base_units(raw: &str, decimals: u32) -> Result<Amount, RouteError> {
    let units = Decimal::from_str(raw).map_err(|e| RouteError::Parse(e.to_string()))?;
    let value = units
        .checked_div(scale(decimals)?)
        .ok_or_else(|| RouteError::Parse("amount overflow".to_string()))?;
    Amount::new(value).map_err(|e| RouteError::Parse(e.to_string()))
}
