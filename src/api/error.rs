//! JSON error responses

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::Error;

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Render `{"error": {"code", "message"}}` with `status`
pub fn error_response(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code,
                message: message.into(),
            },
        }),
    )
        .into_response()
}

/// Errors from routes backed by the completion endpoint
#[derive(Debug)]
pub enum ContentError {
    NotConfigured,
    BadRequest(String),
    InvalidResponse(String),
    Upstream(String),
    Internal(String),
}

impl From<Error> for ContentError {
    fn from(error: Error) -> Self {
        match error {
            Error::InvalidInput(msg) => Self::BadRequest(msg),
            Error::Config(_) => Self::NotConfigured,
            Error::InvalidResponse(msg) => Self::InvalidResponse(msg),
            Error::Llm(msg) => Self::Upstream(msg),
            Error::Http(e) => Self::Upstream(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ContentError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ContentError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "not_configured",
                "AI service not configured: GROQ_API_KEY is missing".to_string(),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::InvalidResponse(msg) => {
                tracing::warn!(error = %msg, "model returned unusable output");
                (StatusCode::INTERNAL_SERVER_ERROR, "invalid_response", msg)
            }
            Self::Upstream(msg) => {
                tracing::error!(error = %msg, "completion request failed");
                (StatusCode::BAD_GATEWAY, "upstream_failed", msg)
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "content route failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };

        error_response(status, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_library_errors() {
        let status = |e: Error| ContentError::from(e).into_response().status();

        assert_eq!(status(Error::InvalidInput("topic is required".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::Config("no key".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(Error::Llm("500".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(Error::InvalidResponse("no json".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
