//! Transmission API server library.
//!
//! Exposes the pieces `main.rs` wires together so integration tests can
//! build the same router around test doubles.

pub mod config;
pub mod error;
pub mod hub;
pub mod images;
pub mod routes;
pub mod rpc;
pub mod state;
pub mod sweeper;
pub mod telemetry;

use axum::Router;

use crate::state::AppState;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::ws::router())
        .nest("/api/v1/sessions", routes::sessions::router())
        .with_state(state)
}
