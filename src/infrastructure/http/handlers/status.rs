//! Status / Model HTTP Handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::{ForceIdle, GetStatus, ListImageModels, ListLlmModels, SetModels};
use crate::domain::GenerationStatus;
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetModelsRequest {
    pub llm_model: String,
    pub image_model: String,
    #[serde(default)]
    pub tts_model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ForceIdleResponse {
    pub previous: String,
}

/// 当前生成状态
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<GenerationStatus>>, ApiError> {
    let status = state.get_status_handler.handle(GetStatus).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// 强制置为空闲（运维恢复）
pub async fn force_idle(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ForceIdleResponse>>, ApiError> {
    let previous = state.force_idle_handler.handle(ForceIdle).await?;
    Ok(Json(ApiResponse::success(ForceIdleResponse { previous })))
}

/// 选择模型
pub async fn set_models(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetModelsRequest>,
) -> Result<Json<ApiResponse<GenerationStatus>>, ApiError> {
    let status = state
        .set_models_handler
        .handle(SetModels {
            llm_model: req.llm_model,
            image_model: req.image_model,
            tts_model: req.tts_model,
        })
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

pub async fn list_llm_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let models = state.list_llm_models_handler.handle(ListLlmModels).await?;
    Ok(Json(ApiResponse::success(models)))
}

pub async fn list_image_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let models = state.list_image_models_handler.handle(ListImageModels).await?;
    Ok(Json(ApiResponse::success(models)))
}
