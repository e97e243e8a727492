//! Profile HTTP Handlers
//!
//! 生成类接口提交到后台执行槽，立即返回 accepted / busy

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::stage::{resolve_model, submit_stage, ModelKind, TriggerResponse};
use crate::application::{
    GenerateMainProfileImage, GenerateProfile, GenerateProfileImageDescription,
    GenerateSampleProfileImages, GetProfile, ListProfiles,
};
use crate::infrastructure::http::dto::{ApiResponse, ProfileIdRequest, ProfileResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateProfileRequest {
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub special_requests: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageDescriptionRequest {
    pub profile_id: Uuid,
    #[serde(default)]
    pub llm_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SampleImagesRequest {
    pub profile_id: Uuid,
    #[serde(default)]
    pub image_model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MainImageRequest {
    pub profile_id: Uuid,
    #[serde(default)]
    pub image_model: Option<String>,
    /// 直接指定种子
    #[serde(default)]
    pub seed: Option<i64>,
    /// 从该图像文件名恢复种子
    #[serde(default)]
    pub source_image: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn generate_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateProfileRequest>,
) -> Result<TriggerResponse, ApiError> {
    let command = GenerateProfile {
        llm_model: resolve_model(&state, req.llm_model, ModelKind::Llm).await?,
        special_requests: req.special_requests,
    };

    let worker = state.clone();
    submit_stage(&state, "profile", async move {
        worker.generate_profile_handler.handle(command).await
    })
    .await
}

pub async fn generate_image_description(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImageDescriptionRequest>,
) -> Result<TriggerResponse, ApiError> {
    let command = GenerateProfileImageDescription {
        profile_id: req.profile_id,
        llm_model: resolve_model(&state, req.llm_model, ModelKind::Llm).await?,
    };

    let worker = state.clone();
    submit_stage(&state, "profile_image_description", async move {
        worker.profile_image_description_handler.handle(command).await
    })
    .await
}

pub async fn generate_sample_images(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SampleImagesRequest>,
) -> Result<TriggerResponse, ApiError> {
    let command = GenerateSampleProfileImages {
        profile_id: req.profile_id,
        image_model: resolve_model(&state, req.image_model, ModelKind::Image).await?,
    };

    let worker = state.clone();
    submit_stage(&state, "sample_profile_images", async move {
        worker.sample_profile_images_handler.handle(command).await
    })
    .await
}

pub async fn generate_main_image(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MainImageRequest>,
) -> Result<TriggerResponse, ApiError> {
    let command = GenerateMainProfileImage {
        profile_id: req.profile_id,
        image_model: resolve_model(&state, req.image_model, ModelKind::Image).await?,
        seed: req.seed,
        source_image: req.source_image,
    };

    let worker = state.clone();
    submit_stage(&state, "main_profile_image", async move {
        worker.main_profile_image_handler.handle(command).await
    })
    .await
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProfileIdRequest>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let profile = state
        .get_profile_handler
        .handle(GetProfile {
            profile_id: req.profile_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(profile.into())))
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ProfileResponse>>>, ApiError> {
    let profiles = state.list_profiles_handler.handle(ListProfiles).await?;
    Ok(Json(ApiResponse::success(
        profiles.into_iter().map(ProfileResponse::from).collect(),
    )))
}
