use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the journal answers with its full schema and the configured
/// factory exists.
pub async fn ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state
        .repo
        .check_schema()
        .await
        .map_err(|e| AppError::Internal(format!("Journal unavailable: {}", e)))?;
    state.chain.next_address(&state.config.factory_address).await?;
    Ok(Json(serde_json::json!({"status": "ready"})))
}
