use crate::protocol::ProtocolError;
use crate::routing::RouteError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Upstream error: {0}")]
    BadGateway(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ProtocolError> for AppError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownFactory(_) | ProtocolError::UnknownVault(_) => {
                AppError::NotFound(err.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<RouteError> for AppError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::NoRoute { .. }
            | RouteError::InsufficientQuote { .. }
            | RouteError::InvalidPlan(_) => AppError::BadRequest(err.to_string()),
            RouteError::Network(_)
            | RouteError::Http { .. }
            | RouteError::RateLimited
            | RouteError::Parse(_) => AppError::BadGateway(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;

    #[test]
    fn test_route_errors_split_client_and_upstream() {
        let no_route = RouteError::NoRoute {
            from: Address::from_label("a"),
            to: Address::from_label("b"),
        };
        assert_eq!(
            AppError::from(no_route).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(RouteError::RateLimited).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_unknown_factory_is_not_found() {
        let err = ProtocolError::UnknownFactory(Address::from_label("f"));
        assert_eq!(
            AppError::from(err).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
