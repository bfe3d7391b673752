//! Chat and translation endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::chat;
use crate::language::Language;
use crate::learning::{self, TranslateRequest};
use crate::llm::ChatMessage;

use super::error::ContentError;
use super::ApiState;

/// Build the chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_reply))
        .route("/api/translate", post(translate))
        .with_state(state)
}

/// A conversation from the chat widget
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

async fn chat_reply(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ContentError> {
    if !state.llm.is_configured() {
        return Err(ContentError::NotConfigured);
    }
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(ContentError::BadRequest("messages are required".to_string()));
    }

    let language = request
        .locale
        .as_deref()
        .map_or_else(Language::default, Language::from_code_lossy);

    let response = chat::respond(&state.llm, &request.messages, language).await?;
    Ok(Json(ChatResponse { response }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_text: String,
}

async fn translate(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ContentError> {
    if !state.llm.is_configured() {
        return Err(ContentError::NotConfigured);
    }
    let Json(request) = payload?;

    let translated_text =
        learning::translate(&state.llm, &request.text, &request.target_lang).await?;
    Ok(Json(TranslateResponse { translated_text }))
}
