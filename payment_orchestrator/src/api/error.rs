//! Maps [`OrchestratorError`] to an HTTP response (spec §7). Grounded
//! in the teacher's `ApiError`/`IntoResponse` wrapper
//! (`transaction_service/src/api/error.rs`), widened to the full kind
//! set this orchestrator's error taxonomy carries. `Declined` is the
//! one kind that is a business outcome rather than a failure — spec §7
//! still has it ride back as a non-2xx so callers branch on status
//! code rather than parsing the body, but the payload carries the
//! gateway's own code/text instead of a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::error::OrchestratorError;

pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            OrchestratorError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            OrchestratorError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                self.0.to_string(),
            ),
            OrchestratorError::PermissionDenied(_) => (
                StatusCode::FORBIDDEN,
                "permission_denied",
                "permission denied".to_string(),
            ),
            OrchestratorError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found", "not found".to_string())
            }
            OrchestratorError::AlreadyExists(msg) => {
                (StatusCode::CONFLICT, "already_exists", msg.clone())
            }
            OrchestratorError::FailedPrecondition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "failed_precondition",
                msg.clone(),
            ),
            OrchestratorError::ResourceExhausted(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                "resource_exhausted",
                msg.clone(),
            ),
            OrchestratorError::DeadlineExceeded => (
                StatusCode::GATEWAY_TIMEOUT,
                "deadline_exceeded",
                self.0.to_string(),
            ),
            OrchestratorError::Unavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "upstream gateway unavailable".to_string(),
            ),
            OrchestratorError::Declined { code, text } => (
                StatusCode::PAYMENT_REQUIRED,
                "declined",
                format!("{code} {text}"),
            ),
            OrchestratorError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
