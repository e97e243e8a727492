//! Scenario HTTP Handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::stage::{resolve_model, submit_stage, ModelKind, TriggerResponse};
use crate::application::{
    GenerateScenario, GenerateScenarioImages, GenerateSceneDescriptions, GetScenario,
    ListScenarios,
};
use crate::infrastructure::http::dto::{
    ApiResponse, ProfileIdRequest, ScenarioIdRequest, ScenarioResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateScenarioRequest {
    pub profile_id: Uuid,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub special_requests: String,
    /// 接着生成场景描述和场景图像
    #[serde(default)]
    pub chain: bool,
    #[serde(default)]
    pub image_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SceneDescriptionsRequest {
    pub scenario_id: Uuid,
    #[serde(default)]
    pub llm_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioImagesRequest {
    pub scenario_id: Uuid,
    #[serde(default)]
    pub image_model: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn generate_scenario(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateScenarioRequest>,
) -> Result<TriggerResponse, ApiError> {
    let chain_image_model = if req.chain {
        Some(resolve_model(&state, req.image_model, ModelKind::Image).await?)
    } else {
        None
    };
    let command = GenerateScenario {
        profile_id: req.profile_id,
        llm_model: resolve_model(&state, req.llm_model, ModelKind::Llm).await?,
        special_requests: req.special_requests,
        chain_image_model,
    };

    let worker = state.clone();
    submit_stage(&state, "scenario", async move {
        worker.generate_scenario_handler.handle(command).await
    })
    .await
}

pub async fn generate_scene_descriptions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SceneDescriptionsRequest>,
) -> Result<TriggerResponse, ApiError> {
    let command = GenerateSceneDescriptions {
        scenario_id: req.scenario_id,
        llm_model: resolve_model(&state, req.llm_model, ModelKind::Llm).await?,
    };

    let worker = state.clone();
    submit_stage(&state, "scene_descriptions", async move {
        worker.scene_descriptions_handler.handle(command).await
    })
    .await
}

pub async fn generate_scenario_images(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScenarioImagesRequest>,
) -> Result<TriggerResponse, ApiError> {
    let command = GenerateScenarioImages {
        scenario_id: req.scenario_id,
        image_model: resolve_model(&state, req.image_model, ModelKind::Image).await?,
    };

    let worker = state.clone();
    submit_stage(&state, "scenario_images", async move {
        worker.scenario_images_handler.handle(command).await
    })
    .await
}

pub async fn get_scenario(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScenarioIdRequest>,
) -> Result<Json<ApiResponse<ScenarioResponse>>, ApiError> {
    let scenario = state
        .get_scenario_handler
        .handle(GetScenario {
            scenario_id: req.scenario_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(scenario.into())))
}

pub async fn list_scenarios(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProfileIdRequest>,
) -> Result<Json<ApiResponse<Vec<ScenarioResponse>>>, ApiError> {
    let scenarios = state
        .list_scenarios_handler
        .handle(ListScenarios {
            profile_id: req.profile_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(
        scenarios.into_iter().map(ScenarioResponse::from).collect(),
    )))
}
