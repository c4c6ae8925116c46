use crate::api::AppState;
use crate::domain::{Address, EventRecord};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub vault: Option<String>,
    pub owner: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
}

fn parse_address(raw: &str, field: &str) -> Result<Address, AppError> {
    Address::from_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} address", field)))
}

/// Journaled events of one vault or one owner, oldest first.
pub async fn get_events(
    Query(params): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Result<Json<EventsResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let events = match (params.vault.as_deref(), params.owner.as_deref()) {
        (Some(vault), None) => {
            let vault = parse_address(vault, "vault")?;
            state.repo.query_events_by_vault(&vault, limit).await?
        }
        (None, Some(owner)) => {
            let owner = parse_address(owner, "owner")?;
            state.repo.query_events_by_owner(&owner, limit).await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "exactly one of vault or owner is required".into(),
            ))
        }
    };

    Ok(Json(EventsResponse { events }))
}
