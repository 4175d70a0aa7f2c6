//! Route definitions

use axum::routing::get;
use axum::Router;

use super::handlers;
use super::server::AppState;
use crate::ws;

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/ws", get(ws::handler::ws_upgrade))
        .with_state(state)
}
