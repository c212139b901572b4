//! Error types and how they reach the client.
//!
//! HTML routes answer with an error page, the AJAX routes with the small JSON
//! bodies the client script reads. Infrastructure failures are logged here
//! and always surface as a generic 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::models::FieldErrors;
use crate::render;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mysql::Error),

    #[error("invalid database url: {0}")]
    InvalidUrl(#[from] mysql::UrlError),

    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("unexpected database response: {0}")]
    Unexpected(String),
}

/// Failure on a route that renders HTML.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, *message),
            Self::Store(err) => {
                tracing::error!(error = %err, "store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
            }
            Self::Session(err) => {
                tracing::error!(error = %err, "session error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.")
            }
        };
        let title = format!("{} Error", status.as_u16());
        (status, render::error_page(&title, message)).into_response()
    }
}

/// Failure on a JSON route.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// The target row could not be loaded.
    #[error("not found")]
    NotFound,

    /// The write matched no row.
    #[error("rejected")]
    Rejected,

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, json!({ "responseText": message })),
            Self::NotFound => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "Something went wrong." }),
            ),
            Self::Rejected => (StatusCode::BAD_REQUEST, json!({ "responseText": "error" })),
            Self::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "overall": {}, "fields": fields }),
            ),
            Self::Store(err) => {
                tracing::error!(error = %err, "store error");
                internal()
            }
            Self::Session(err) => {
                tracing::error!(error = %err, "session error");
                internal()
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                internal()
            }
        };
        (status, Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "responseText": "Something went wrong." }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_not_found_is_404() {
        let response = PageError::NotFound("User not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn page_internal_is_500() {
        let err = PageError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "internal error: boom");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn api_status_codes() {
        assert_eq!(
            ApiError::Forbidden("no").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Rejected.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Validation(FieldErrors::default()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Store(StoreError::UnsupportedUrl("x".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::DuplicateEmail("bob@domain.com".into());
        assert_eq!(err.to_string(), "email already registered: bob@domain.com");
    }
}
