//! Error handling utilities for route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use crate::services::moderation::ModerationError;

/// An HTTP error with a message that is safe to show the caller
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::Validation(msg) => ApiError::new(StatusCode::BAD_REQUEST, msg),
            ModerationError::Decode(e) => {
                ApiError::new(StatusCode::BAD_REQUEST, format!("Unreadable image: {e}"))
            }
            ModerationError::InjectionDetected(_) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "Potential prompt injection detected",
            ),
            ModerationError::Aggregation(e) => {
                error!(error = %e, "all analysis branches failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Content could not be analyzed; no verdict was produced",
                )
            }
            ModerationError::DeadlineExceeded(_) => ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                "Moderation did not complete in time",
            ),
            ModerationError::Internal(detail) => {
                error!(detail = %detail, "unexpected moderation fault");
                ApiError::internal()
            }
        }
    }
}

/// Extension trait for logging errors and converting to ApiError
pub trait LogErr<T> {
    /// Log error with context and return a custom status carrying the context as message
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiError> {
        self.map_err(|e| {
            warn!(error = %e, status = status.as_u16(), "{}", context);
            ApiError::new(status, context)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregator::AggregationError;
    use crate::models::{BranchFailure, FailureKind};
    use std::time::Duration;

    #[test]
    fn status_mapping() {
        let cases = [
            (ModerationError::Validation("missing"), StatusCode::BAD_REQUEST),
            (
                ModerationError::DeadlineExceeded(Duration::from_secs(1)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ModerationError::Aggregation(AggregationError {
                    image: BranchFailure::new(FailureKind::Timeout, "slow"),
                    text: BranchFailure::new(FailureKind::Upstream, "502"),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ApiError::from(ModerationError::Internal("pool poisoned at 0xdead".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("0xdead"));
    }

    #[test]
    fn log_status_keeps_the_requested_status() {
        let result: Result<(), &str> = Err("boom");
        let err = result
            .log_status("Invalid multipart body", StatusCode::BAD_REQUEST)
            .expect_err("mapped");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid multipart body");
    }
}
