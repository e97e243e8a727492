//! Chat / Speech HTTP Handlers
//!
//! 对话回复和语音合成同步执行（仍经过生成门）

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::stage::{resolve_model, ModelKind};
use crate::application::{GenerateSpeech, GetMessages, RespondToChat};
use crate::infrastructure::http::dto::{
    ApiResponse, MessageResponse, ScenarioIdRequest, StageResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatSendRequest {
    pub scenario_id: Uuid,
    #[serde(default)]
    pub scene_index: usize,
    pub message: String,
    #[serde(default)]
    pub llm_model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatExchangeResponse {
    pub user_message: MessageResponse,
    pub reply: MessageResponse,
}

#[derive(Debug, Deserialize)]
pub struct SpeechHttpRequest {
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SpeechHttpResponse {
    pub audio_path: String,
    pub size_bytes: usize,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatSendRequest>,
) -> Result<Json<ApiResponse<StageResponse<ChatExchangeResponse>>>, ApiError> {
    let command = RespondToChat {
        scenario_id: req.scenario_id,
        scene_index: req.scene_index,
        message: req.message,
        llm_model: resolve_model(&state, req.llm_model, ModelKind::Llm).await?,
    };

    let outcome = state.respond_to_chat_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(StageResponse::from_outcome(
        outcome,
        |exchange| ChatExchangeResponse {
            user_message: exchange.user_message.into(),
            reply: exchange.reply.into(),
        },
    ))))
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScenarioIdRequest>,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, ApiError> {
    let messages = state
        .get_messages_handler
        .handle(GetMessages {
            scenario_id: req.scenario_id,
        })
        .await?;
    Ok(Json(ApiResponse::success(
        messages.into_iter().map(MessageResponse::from).collect(),
    )))
}

pub async fn generate_speech(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeechHttpRequest>,
) -> Result<Json<ApiResponse<StageResponse<SpeechHttpResponse>>>, ApiError> {
    let outcome = state
        .generate_speech_handler
        .handle(GenerateSpeech {
            text: req.text,
            model: req.model,
            voice: req.voice,
        })
        .await?;

    Ok(Json(ApiResponse::success(StageResponse::from_outcome(
        outcome,
        |speech| SpeechHttpResponse {
            audio_path: speech.audio_path.to_string_lossy().into_owned(),
            size_bytes: speech.size_bytes,
        },
    ))))
}
