pub mod events;
pub mod health;
pub mod plan;
pub mod positions;

use crate::config::Config;
use crate::db::Repository;
use crate::host::ChainReader;
use crate::routing::RouteSource;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<dyn ChainReader>,
    pub repo: Arc<Repository>,
    pub routes: Arc<dyn RouteSource>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        repo: Arc<Repository>,
        routes: Arc<dyn RouteSource>,
        config: Config,
    ) -> Self {
        Self {
            chain,
            repo,
            routes,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/next-address", get(positions::get_next_address))
        .route("/v1/positions", get(positions::get_positions))
        .route("/v1/events", get(events::get_events))
        .route("/v1/plan/open", get(plan::plan_open_position))
        .route("/v1/plan/close", get(plan::plan_close_position))
        .layer(cors)
        .with_state(state)
}
