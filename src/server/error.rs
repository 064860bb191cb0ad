//! API error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::jobs::OrchestrationError;
use crate::pipeline::TriggerError;
use crate::scheduling::ReconcileError;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "InvalidRequestError", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", message)
    }

    /// The entry point has no configured collaborator.
    pub fn unavailable(feature: &str) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "NotConfiguredError",
            format!("{} is not configured on this server", feature),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.kind.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        let status = match &err {
            OrchestrationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OrchestrationError::UnknownJob { .. } => StatusCode::NOT_FOUND,
            OrchestrationError::RejectedSubmission { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            OrchestrationError::TransientBackend { .. }
            | OrchestrationError::UnmappedStatus { .. } => StatusCode::BAD_GATEWAY,
            OrchestrationError::AuditWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        let status = match &err {
            TriggerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            TriggerError::Engine(_) => StatusCode::BAD_GATEWAY,
            TriggerError::AuditWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        let status = match &err {
            ReconcileError::InvalidEvent(_) | ReconcileError::InvalidDocument(_) => {
                StatusCode::BAD_REQUEST
            }
            ReconcileError::Scheduler { .. } => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestration_errors_map_to_status_codes() {
        let cases = [
            (
                OrchestrationError::InvalidRequest("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrchestrationError::UnknownJob {
                    backend: "b".to_string(),
                    handle: "aef_1".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                OrchestrationError::RejectedSubmission {
                    backend: "b".to_string(),
                    message: "m".to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                OrchestrationError::UnmappedStatus {
                    backend: "b".to_string(),
                    raw: "WAT".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                OrchestrationError::AuditWrite("disk".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let kind = err.kind();
            let api_error = ApiError::from(err);
            assert_eq!(api_error.status(), status);
            assert_eq!(api_error.kind(), kind);
        }
    }

    #[test]
    fn unmapped_status_message_keeps_raw_text() {
        let api_error = ApiError::from(OrchestrationError::UnmappedStatus {
            backend: "dataflow-executor".to_string(),
            raw: "JOB_STATE_DRAINED".to_string(),
        });
        assert!(api_error.message().contains("JOB_STATE_DRAINED"));
        assert!(api_error.message().contains("dataflow-executor"));
    }

    #[test]
    fn reconcile_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(ReconcileError::InvalidEvent("x".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::unavailable("scheduling").status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
