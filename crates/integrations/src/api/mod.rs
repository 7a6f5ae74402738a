//! Store integration API façade.
//!
//! Every service operation is wrapped in an [`ApiResponse`] envelope so
//! callers render `message` and never inspect error types. The HTTP routes
//! serialize these envelopes directly.

mod facade;
mod forms;

pub use facade::{BulkSyncItem, BulkSyncReport, ConnectionStats, StoreIntegrationApi};
pub use forms::{FormField, form_fields};

use serde::{Deserialize, Serialize};

use crate::db::RepositoryError;
use crate::platforms::{AdapterError, FactoryError};
use crate::services::IntegrationError;

/// Coarse failure category, used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    Upstream,
    Internal,
}

impl From<&IntegrationError> for FailureKind {
    fn from(err: &IntegrationError) -> Self {
        match err {
            IntegrationError::UnsupportedPlatform(_)
            | IntegrationError::InvalidCredentials
            | IntegrationError::Credentials(_)
            | IntegrationError::NotConnected => Self::BadRequest,
            IntegrationError::InvalidSignature => Self::Unauthorized,
            IntegrationError::NotFound
            | IntegrationError::Repository(RepositoryError::NotFound) => Self::NotFound,
            IntegrationError::SyncInProgress
            | IntegrationError::Repository(RepositoryError::Conflict(_)) => Self::Conflict,
            IntegrationError::Adapter(AdapterError::CredentialMismatch { .. }) => Self::Internal,
            IntegrationError::Adapter(_) => Self::Upstream,
            IntegrationError::Repository(_)
            | IntegrationError::Crypto(_)
            | IntegrationError::Factory(FactoryError::NotInitialized | FactoryError::Repository(_))
            | IntegrationError::Factory(FactoryError::Unsupported(_)) => Self::Internal,
        }
    }
}

/// Uniform result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: message.into(),
            failure: None,
        }
    }

    pub fn fail(err: &IntegrationError, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            message: message.into(),
            failure: Some(err.into()),
        }
    }

    /// Wrap a service result, logging failures.
    pub fn from_result(
        result: Result<T, IntegrationError>,
        success_message: &str,
        failure_message: &str,
    ) -> Self {
        match result {
            Ok(data) => Self::ok(data, success_message),
            Err(e) => {
                if e.is_client_error() {
                    tracing::debug!(error = %e, "{failure_message}");
                } else {
                    tracing::warn!(error = %e, "{failure_message}");
                }
                Self::fail(&e, failure_message)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_shape() {
        let response = ApiResponse::ok(vec![1, 2], "Loaded");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2], "message": "Loaded"}));
    }

    #[test]
    fn test_failure_envelope_shape() {
        let response: ApiResponse<()> =
            ApiResponse::fail(&IntegrationError::NotFound, "Failed to disconnect store");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "Store connection not found",
                "message": "Failed to disconnect store"
            })
        );
        assert_eq!(response.failure, Some(FailureKind::NotFound));
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            FailureKind::from(&IntegrationError::InvalidCredentials),
            FailureKind::BadRequest
        );
        assert_eq!(
            FailureKind::from(&IntegrationError::SyncInProgress),
            FailureKind::Conflict
        );
        assert_eq!(
            FailureKind::from(&IntegrationError::Adapter(AdapterError::RateLimited(2))),
            FailureKind::Upstream
        );
    }
}
