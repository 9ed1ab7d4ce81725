//! Axum router construction for the relay.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the relay.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/{role}` -- rig or operator `WebSocket` session
/// - `GET /api/status` -- relay and lobby snapshot
/// - `GET /api/leaderboard` -- finished missions
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/{role}", get(ws::ws_session))
        // REST API
        .route("/api/status", get(handlers::get_status))
        .route("/api/leaderboard", get(handlers::get_leaderboard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
