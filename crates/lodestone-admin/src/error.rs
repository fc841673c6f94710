//! Error types for the admin API server.
//!
//! [`AdminError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lodestone_core::PublishError;
use lodestone_db::DbError;

/// Errors that can occur in the admin API layer.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// The request body or a parameter was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A UUID could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// The key store or a collaborator cannot serve the request.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for AdminError {
    fn from(e: DbError) -> Self {
        if e.is_unavailable() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}

impl From<PublishError> for AdminError {
    fn from(e: PublishError) -> Self {
        match e {
            PublishError::Empty => Self::InvalidInput("announcement message is empty".to_owned()),
            PublishError::Store(db) => db.into(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidInput(msg) | Self::InvalidUuid(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
