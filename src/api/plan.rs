use crate::api::AppState;
use crate::domain::{Address, Amount, SwapInstruction};
use crate::error::AppError;
use crate::protocol::OpenPosition;
use crate::routing::{plan_close_full, plan_open, OpenPlan};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOpenQuery {
    pub owner: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub deposit: Amount,
    pub borrow: Amount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOpenResponse {
    /// Address to approve the deposit to before submitting.
    pub vault: Address,
    pub slippage_bps: u32,
    pub request: OpenPosition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCloseQuery {
    pub owner: Address,
    pub vault: Address,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCloseResponse {
    pub vault: Address,
    pub debt_balance: Amount,
    pub slippage_bps: u32,
    pub swap: SwapInstruction,
}

/// Quote an open on the configured factory's next vault.
///
/// Nothing is submitted; the caller approves `vault` and sends `request`.
pub async fn plan_open_position(
    Query(params): Query<PlanOpenQuery>,
    State(state): State<AppState>,
) -> Result<Json<PlanOpenResponse>, AppError> {
    let factory = state.config.factory_address;
    let vault = state.chain.next_address(&factory).await?;
    let plan = OpenPlan {
        owner: params.owner,
        collateral_asset: params.collateral_asset,
        debt_asset: params.debt_asset,
        deposit: params.deposit,
        borrow: params.borrow,
        slippage_bps: state.config.slippage_bps,
    };
    let request = plan_open(state.routes.as_ref(), vault, &plan).await?;
    debug!(%vault, owner = %params.owner, "open planned over HTTP");

    Ok(Json(PlanOpenResponse {
        vault,
        slippage_bps: state.config.slippage_bps,
        request,
    }))
}

/// Size the swap for a full close of one of `owner`'s vaults.
pub async fn plan_close_position(
    Query(params): Query<PlanCloseQuery>,
    State(state): State<AppState>,
) -> Result<Json<PlanCloseResponse>, AppError> {
    let factory = state.config.factory_address;
    let position = state
        .chain
        .list_positions(&params.owner, &factory)
        .await?
        .into_iter()
        .find(|p| p.vault == params.vault)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "vault {} is not owned by {}",
                params.vault, params.owner
            ))
        })?;
    let swap = plan_close_full(state.routes.as_ref(), &position, state.config.slippage_bps).await?;

    Ok(Json(PlanCloseResponse {
        vault: position.vault,
        debt_balance: position.debt_balance,
        slippage_bps: state.config.slippage_bps,
        swap,
    }))
}
