use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::curation::groups::ListError;
use crate::curation::resolution::ResolveError;
use crate::curation::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::InvalidCanonical { .. } | ResolveError::InvalidGroup(_) => {
                AppError::Validation(e.to_string())
            }
            ResolveError::AlreadyResolved(_) => AppError::Conflict {
                code: "ALREADY_RESOLVED",
                message: e.to_string(),
            },
            ResolveError::CanonicalUnavailable(_) => AppError::Conflict {
                code: "CANONICAL_UNAVAILABLE",
                message: e.to_string(),
            },
            ResolveError::MemberUnavailable(_) => AppError::Conflict {
                code: "MEMBER_UNAVAILABLE",
                message: e.to_string(),
            },
            ResolveError::UpstreamUnavailable(_) => AppError::UpstreamUnavailable(e.to_string()),
            ResolveError::Persistence(_) => AppError::Persistence(e.to_string()),
        }
    }
}

impl From<ListError> for AppError {
    fn from(e: ListError) -> Self {
        AppError::UpstreamUnavailable(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(db) | StoreError::Unavailable(db) => {
                AppError::UpstreamUnavailable(db.to_string())
            }
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, *code, message.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Caller identity required".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Caller may not resolve duplicates".to_string(),
            ),
            AppError::UpstreamUnavailable(msg) => {
                tracing::warn!("Upstream unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UPSTREAM_UNAVAILABLE",
                    "A dependency is unavailable; retry shortly".to_string(),
                )
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence failure: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_FAILURE",
                    "The resolution was not saved; nothing was changed".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
