//! Study material endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use serde::Deserialize;

use crate::learning::{
    self, FlashcardRequest, FlashcardSet, LearnerProfile, PersonalizedRoadmap, RoadmapRequest,
    SlideDeck, SlideRequest, WeeklyRoadmap,
};

use super::error::ContentError;
use super::ApiState;

/// Build the content router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/generate", post(slides))
        .route("/api/flashcards", post(flashcards))
        .route("/api/roadmap", post(weekly_roadmap))
        .route("/api/generate-roadmap", post(personalized_roadmap))
        .with_state(state)
}

fn ensure_configured(state: &ApiState) -> Result<(), ContentError> {
    if state.llm.is_configured() {
        Ok(())
    } else {
        Err(ContentError::NotConfigured)
    }
}

async fn slides(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<SlideRequest>, JsonRejection>,
) -> Result<Json<SlideDeck>, ContentError> {
    ensure_configured(&state)?;
    let Json(request) = payload?;
    Ok(Json(learning::generate_slides(&state.llm, &request).await?))
}

async fn flashcards(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<FlashcardRequest>, JsonRejection>,
) -> Result<Json<FlashcardSet>, ContentError> {
    ensure_configured(&state)?;
    let Json(request) = payload?;
    Ok(Json(learning::generate_flashcards(&state.llm, &request).await?))
}

async fn weekly_roadmap(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<RoadmapRequest>, JsonRejection>,
) -> Result<Json<WeeklyRoadmap>, ContentError> {
    ensure_configured(&state)?;
    let Json(request) = payload?;
    Ok(Json(learning::generate_weekly_roadmap(&state.llm, &request).await?))
}

/// Body of a personalized roadmap request
#[derive(Debug, Deserialize)]
pub struct PersonalizedRoadmapRequest {
    #[serde(default)]
    pub profile: LearnerProfile,
    #[serde(default)]
    pub language: Option<String>,
}

async fn personalized_roadmap(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<PersonalizedRoadmapRequest>, JsonRejection>,
) -> Result<Json<PersonalizedRoadmap>, ContentError> {
    ensure_configured(&state)?;
    let Json(request) = payload?;
    let language = request.language.as_deref().unwrap_or("en");
    Ok(Json(
        learning::generate_personalized_roadmap(&state.llm, &request.profile, language).await?,
    ))
}
