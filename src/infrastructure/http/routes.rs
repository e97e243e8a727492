//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                         GET   健康检查
//! - /api/status                       GET   当前生成状态
//! - /api/status/idle                  POST  强制置为空闲
//! - /api/status/models                POST  选择模型
//! - /api/models/llm                   GET   语言模型列表
//! - /api/models/image                 GET   图像模型列表
//! - /api/profile/generate             POST  生成角色设定（后台）
//! - /api/profile/image_description    POST  生成头像描述（后台）
//! - /api/profile/sample_images        POST  生成样图（后台）
//! - /api/profile/main_image           POST  生成主头像（后台）
//! - /api/profile/get                  POST  获取角色设定
//! - /api/profile/list                 GET   列出角色设定
//! - /api/scenario/generate            POST  生成情景（后台，可串联场景与图像）
//! - /api/scenario/scene_descriptions  POST  生成场景描述（后台）
//! - /api/scenario/images              POST  生成场景图像（后台）
//! - /api/scenario/get                 POST  获取情景
//! - /api/scenario/list                POST  列出某角色的情景
//! - /api/chat/send                    POST  发送消息并获得角色回复
//! - /api/chat/messages                POST  对话记录
//! - /api/speech                       POST  语音合成
//! - /api/surprise                     POST  一键生成（后台）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/status", status_routes())
        .nest("/models", model_routes())
        .nest("/profile", profile_routes())
        .nest("/scenario", scenario_routes())
        .nest("/chat", chat_routes())
        .route("/speech", post(handlers::generate_speech))
        .route("/surprise", post(handlers::surprise_me))
}

/// Status 路由
fn status_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::get_status))
        .route("/idle", post(handlers::force_idle))
        .route("/models", post(handlers::set_models))
}

/// Model 路由
fn model_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/llm", get(handlers::list_llm_models))
        .route("/image", get(handlers::list_image_models))
}

/// Profile 路由
fn profile_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(handlers::generate_profile))
        .route("/image_description", post(handlers::generate_image_description))
        .route("/sample_images", post(handlers::generate_sample_images))
        .route("/main_image", post(handlers::generate_main_image))
        .route("/get", post(handlers::get_profile))
        .route("/list", get(handlers::list_profiles))
}

/// Scenario 路由
fn scenario_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(handlers::generate_scenario))
        .route("/scene_descriptions", post(handlers::generate_scene_descriptions))
        .route("/images", post(handlers::generate_scenario_images))
        .route("/get", post(handlers::get_scenario))
        .route("/list", post(handlers::list_scenarios))
}

/// Chat 路由
fn chat_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/send", post(handlers::send_message))
        .route("/messages", post(handlers::get_messages))
}
