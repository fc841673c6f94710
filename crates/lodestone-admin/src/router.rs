//! Axum router construction for the admin API.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AdminState;

/// Build the complete Axum router for the admin server.
///
/// The router includes:
/// - `GET /api/status` -- store and feed status
/// - `GET /api/announcements` -- retained feed
/// - `POST /api/announcements` -- publish an announcement
/// - `GET /api/actors/{id}/snapshot` -- an actor's baseline
/// - `GET /api/stats/global` -- aggregate statistics
pub fn build_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/api/status", get(handlers::status))
        .route(
            "/api/announcements",
            get(handlers::list_announcements).post(handlers::publish_announcement),
        )
        .route("/api/actors/{id}/snapshot", get(handlers::get_snapshot))
        .route("/api/stats/global", get(handlers::global_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
