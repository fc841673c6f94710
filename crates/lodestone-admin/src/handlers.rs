//! REST API endpoint handlers for the admin server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/status` | Store availability and feed settings |
//! | `POST` | `/api/announcements` | Publish an announcement |
//! | `GET` | `/api/announcements?order=oldest\|newest` | Retained feed, oldest first by default |
//! | `GET` | `/api/actors/{id}/snapshot` | Persisted baseline for an actor |
//! | `GET` | `/api/stats/global` | Aggregate live statistics |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use lodestone_db::FeedOrder;
use lodestone_types::{ActorId, StatsKey};

use crate::error::AdminError;
use crate::state::AdminState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/announcements`.
#[derive(Debug, serde::Deserialize)]
pub struct PublishRequest {
    /// Announcement text; surrounding whitespace is trimmed.
    pub message: String,
}

/// Query parameters for `GET /api/announcements`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListQuery {
    /// `oldest` (default) or `newest` first.
    #[serde(default)]
    pub order: ListOrder,
}

/// Listing direction accepted on the query string.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Oldest announcement first.
    #[default]
    Oldest,
    /// Newest announcement first.
    Newest,
}

impl From<ListOrder> for FeedOrder {
    fn from(order: ListOrder) -> Self {
        match order {
            ListOrder::Oldest => Self::OldestFirst,
            ListOrder::Newest => Self::NewestFirst,
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Report whether the store is usable and how the feed is configured.
pub async fn status(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    let Some(feed) = state.feed.as_ref() else {
        return Json(serde_json::json!({
            "store": "unavailable",
            "uptime_seconds": uptime_seconds,
        }));
    };

    let store = if feed.store().is_closed() {
        "unavailable"
    } else {
        "available"
    };
    let config = feed.config();
    Json(serde_json::json!({
        "store": store,
        "retention": config.retention,
        "line_budget": config.line_budget,
        "settle_delay_ms": config.settle_delay_ms,
        "uptime_seconds": uptime_seconds,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/announcements
// ---------------------------------------------------------------------------

/// Publish an announcement and push it to connected actors.
pub async fn publish_announcement(
    State(state): State<Arc<AdminState>>,
    Json(request): Json<PublishRequest>,
) -> Result<impl IntoResponse, AdminError> {
    let id = state.feed()?.publish_announcement(&request.message).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

// ---------------------------------------------------------------------------
// GET /api/announcements
// ---------------------------------------------------------------------------

/// List the retained feed, oldest first unless `?order=newest`.
pub async fn list_announcements(
    State(state): State<Arc<AdminState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AdminError> {
    let items = state.feed()?.feed_in(query.order.into()).await?;
    Ok(Json(serde_json::json!({
        "count": items.len(),
        "announcements": items,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/actors/{id}/snapshot
// ---------------------------------------------------------------------------

/// Return an actor's persisted baseline. Unknown actors read as zero.
pub async fn get_snapshot(
    State(state): State<Arc<AdminState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AdminError> {
    let actor_id: ActorId = id_str
        .parse()
        .map_err(|e| AdminError::InvalidUuid(format!("'{id_str}' is not a valid UUID: {e}")))?;
    let snapshot = state.feed()?.store().snapshots().get(actor_id).await?;
    Ok(Json(snapshot))
}

// ---------------------------------------------------------------------------
// GET /api/stats/global
// ---------------------------------------------------------------------------

/// Return the aggregate live counters.
pub async fn global_stats(
    State(state): State<Arc<AdminState>>,
) -> Result<impl IntoResponse, AdminError> {
    let stats = state
        .stats
        .live_stats(&StatsKey::Global)
        .map_err(|e| AdminError::Unavailable(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "key": StatsKey::Global.to_string(),
        "items_sold": stats.items_sold,
        "money_earned": stats.money_earned,
    })))
}
