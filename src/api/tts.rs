//! Speech proxy endpoint
//!
//! `GET /api/tts?text=..&lang=..` forwards to the upstream speech service
//! with a browser User-Agent and returns its MP3 with a one-hour cache.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use super::error::error_response;
use super::ApiState;

/// Build the speech proxy router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/tts", get(synthesize))
        .with_state(state)
}

/// Query parameters for the speech proxy
#[derive(Debug, Deserialize)]
pub struct TtsQuery {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub lang: Option<String>,
}

async fn synthesize(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<TtsQuery>, QueryRejection>,
) -> Result<Response, TtsError> {
    let Query(query) = query?;
    if query.text.trim().is_empty() {
        return Err(TtsError::MissingText);
    }
    let lang = query
        .lang
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("en");

    let audio = state
        .tts
        .synthesize(&query.text, lang)
        .await
        .map_err(|e| TtsError::Upstream(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        audio,
    )
        .into_response())
}

/// Speech proxy errors
#[derive(Debug)]
pub enum TtsError {
    MissingText,
    BadQuery(String),
    Upstream(String),
}

impl From<QueryRejection> for TtsError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadQuery(rejection.body_text())
    }
}

impl IntoResponse for TtsError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingText => {
                error_response(StatusCode::BAD_REQUEST, "bad_request", "Text is required")
            }
            Self::BadQuery(msg) => error_response(StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Upstream(msg) => {
                tracing::error!(error = %msg, "speech proxy failed");
                error_response(StatusCode::BAD_GATEWAY, "tts_failed", msg)
            }
        }
    }
}
