//! HTTP error handling.
//!
//! Service outcomes travel as [`ApiResponse`] envelopes; [`AppError`] covers
//! what fails before a handler reaches the façade (identity, path and body
//! extraction) and maps envelope failures to status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::api::{ApiResponse, FailureKind};

/// Application-level error type for the integration HTTP surface.
#[derive(Debug, Error)]
pub enum AppError {
    /// Caller identity missing or malformed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Integration request error"
            );
        }

        let status = match &self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let error = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(error),
            message: "Request rejected".to_string(),
            failure: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Status code for an envelope.
#[must_use]
pub const fn status_for(failure: Option<FailureKind>) -> StatusCode {
    match failure {
        None => StatusCode::OK,
        Some(FailureKind::BadRequest) => StatusCode::BAD_REQUEST,
        Some(FailureKind::Unauthorized) => StatusCode::UNAUTHORIZED,
        Some(FailureKind::NotFound) => StatusCode::NOT_FOUND,
        Some(FailureKind::Conflict) => StatusCode::CONFLICT,
        Some(FailureKind::Upstream) => StatusCode::BAD_GATEWAY,
        Some(FailureKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serialize an envelope with the status its outcome implies.
///
/// Server-side failures are reported to Sentry.
pub fn envelope<T: Serialize>(response: ApiResponse<T>) -> Response {
    if matches!(response.failure, Some(FailureKind::Internal)) {
        let event_id = sentry::capture_message(
            response.error.as_deref().unwrap_or(&response.message),
            sentry::Level::Error,
        );
        tracing::error!(
            error = response.error.as_deref().unwrap_or_default(),
            sentry_event_id = %event_id,
            "Integration request error"
        );
    }
    (status_for(response.failure), Json(response)).into_response()
}

/// Set the Sentry user context from the caller's user ID.
pub fn set_sentry_user(user_id: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
