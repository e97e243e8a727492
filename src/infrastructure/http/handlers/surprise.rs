//! Surprise Me HTTP Handler

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::stage::{resolve_model, submit_stage, ModelKind, TriggerResponse};
use crate::application::SurpriseMe;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SurpriseRequest {
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub image_model: Option<String>,
    #[serde(default)]
    pub special_requests: String,
}

/// 一键生成角色、头像与情景
pub async fn surprise_me(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SurpriseRequest>,
) -> Result<TriggerResponse, ApiError> {
    let command = SurpriseMe {
        llm_model: resolve_model(&state, req.llm_model, ModelKind::Llm).await?,
        image_model: resolve_model(&state, req.image_model, ModelKind::Image).await?,
        special_requests: req.special_requests,
    };

    let worker = state.clone();
    submit_stage(&state, "surprise_me", async move {
        worker.surprise_me_handler.handle(command).await
    })
    .await
}
