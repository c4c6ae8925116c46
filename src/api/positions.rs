use crate::api::AppState;
use crate::domain::{Address, Timestamp};
use crate::error::AppError;
use crate::protocol::PositionView;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsQuery {
    pub owner: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub owner: Address,
    pub factory: Address,
    pub positions: Vec<PositionView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAddressResponse {
    pub factory: Address,
    pub next_address: Address,
    pub block_time: Timestamp,
}

pub async fn get_positions(
    Query(params): Query<PositionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let owner = Address::from_str(&params.owner)
        .map_err(|_| AppError::BadRequest("Invalid owner address".into()))?;
    let factory = state.config.factory_address;

    let positions = state.chain.list_positions(&owner, &factory).await?;

    Ok(Json(PositionsResponse {
        owner,
        factory,
        positions,
    }))
}

/// Address the next open on the configured factory will deploy to.
pub async fn get_next_address(
    State(state): State<AppState>,
) -> Result<Json<NextAddressResponse>, AppError> {
    let factory = state.config.factory_address;
    let next_address = state.chain.next_address(&factory).await?;
    let block_time = state.chain.block_time().await;

    Ok(Json(NextAddressResponse {
        factory,
        next_address,
        block_time,
    }))
}
