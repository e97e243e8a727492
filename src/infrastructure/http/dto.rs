//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{
    MessageRecord, ProfileRecord, ScenarioRecord, StageOutcome,
};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 生成阶段的触发结果
///
/// - `accepted`：已提交到后台执行槽
/// - `completed`：同步执行完成
/// - `busy`：生成器被占用，`status` 为占用者的状态
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StageResponse<T: Serialize> {
    Accepted { task: String },
    Completed { result: T },
    Busy { status: String },
}

impl<T: Serialize> StageResponse<T> {
    pub fn from_outcome<U>(outcome: StageOutcome<U>, f: impl FnOnce(U) -> T) -> Self {
        match outcome {
            StageOutcome::Completed(value) => StageResponse::Completed { result: f(value) },
            StageOutcome::Busy { status } => StageResponse::Busy { status },
        }
    }
}

// ============================================================================
// 请求
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProfileIdRequest {
    pub profile_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioIdRequest {
    pub scenario_id: Uuid,
}

// ============================================================================
// 记录
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub background: String,
    pub personality: String,
    pub interests: String,
    pub physical_characteristics: String,
    pub image_description: String,
    pub image_seed: Option<i64>,
    pub image_paths: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProfileRecord> for ProfileResponse {
    fn from(p: ProfileRecord) -> Self {
        Self {
            id: p.id,
            name: p.name,
            background: p.background,
            personality: p.personality,
            interests: p.interests,
            physical_characteristics: p.physical_characteristics,
            image_description: p.image_description,
            image_seed: p.image_seed,
            image_paths: p.image_paths,
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScenarioResponse {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub title: String,
    pub summary: String,
    pub scene_summaries: Vec<String>,
    pub invitation: String,
    pub scene_descriptions: Vec<String>,
    pub images: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ScenarioRecord> for ScenarioResponse {
    fn from(s: ScenarioRecord) -> Self {
        Self {
            id: s.id,
            profile_id: s.profile_id,
            title: s.title,
            summary: s.summary,
            scene_summaries: s.scene_summaries,
            invitation: s.invitation,
            scene_descriptions: s.scene_descriptions,
            images: s.images,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub order: i64,
    pub role: &'static str,
    pub content: String,
    pub created_at: String,
}

impl From<MessageRecord> for MessageResponse {
    fn from(m: MessageRecord) -> Self {
        Self {
            id: m.id,
            order: m.order,
            role: m.role.as_str(),
            content: m.content,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}
