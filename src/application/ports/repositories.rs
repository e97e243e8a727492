//! Repository Ports - 出站端口
//!
//! 定义数据持久化的抽象接口
//! 具体实现在 infrastructure 层（如 SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::GenerationStatus;

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// ============================================================================
// Profile Repository
// ============================================================================

/// 角色设定实体（用于持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub name: String,
    pub background: String,
    pub personality: String,
    pub interests: String,
    pub physical_characteristics: String,
    /// 头像生成提示词
    pub image_description: String,
    /// 主头像种子
    pub image_seed: Option<i64>,
    /// 本地图像路径，保持生成顺序
    pub image_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn new(
        name: String,
        background: String,
        personality: String,
        interests: String,
        physical_characteristics: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            background,
            personality,
            interests,
            physical_characteristics,
            image_description: String::new(),
            image_seed: None,
            image_paths: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Profile Repository Port
#[async_trait]
pub trait ProfileRepositoryPort: Send + Sync {
    /// 保存（插入或覆盖）
    async fn save(&self, profile: &ProfileRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepositoryError>;

    /// 按创建时间倒序
    async fn find_all(&self) -> Result<Vec<ProfileRecord>, RepositoryError>;
}

// ============================================================================
// Scenario Repository
// ============================================================================

/// 情景实体
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRecord {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub title: String,
    pub summary: String,
    pub scene_summaries: Vec<String>,
    pub invitation: String,
    pub scene_descriptions: Vec<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScenarioRecord {
    pub fn new(
        profile_id: Uuid,
        title: String,
        summary: String,
        scene_summaries: Vec<String>,
        invitation: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile_id,
            title,
            summary,
            scene_summaries,
            invitation,
            scene_descriptions: Vec::new(),
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Scenario Repository Port
#[async_trait]
pub trait ScenarioRepositoryPort: Send + Sync {
    async fn save(&self, scenario: &ScenarioRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScenarioRecord>, RepositoryError>;

    async fn find_by_profile(&self, profile_id: Uuid) -> Result<Vec<ScenarioRecord>, RepositoryError>;
}

// ============================================================================
// Message Repository
// ============================================================================

/// 对话消息发送方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Character,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Character => "character",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "character" => Some(MessageRole::Character),
            _ => None,
        }
    }
}

/// 对话消息
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: Uuid,
    pub scenario_id: Uuid,
    pub order: i64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(scenario_id: Uuid, order: i64, role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            scenario_id,
            order,
            role,
            content,
            created_at: Utc::now(),
        }
    }
}

/// Message Repository Port
#[async_trait]
pub trait MessageRepositoryPort: Send + Sync {
    async fn save(&self, message: &MessageRecord) -> Result<(), RepositoryError>;

    /// 按 order 升序
    async fn find_by_scenario(&self, scenario_id: Uuid) -> Result<Vec<MessageRecord>, RepositoryError>;

    /// 下一条消息的 order（无消息时为 0）
    async fn next_order(&self, scenario_id: Uuid) -> Result<i64, RepositoryError>;
}

// ============================================================================
// Model Usage (GenerationStatus 的存储)
// ============================================================================

/// Model Usage Port
///
/// 全局唯一的生成状态记录。`compare_and_set_status` 必须是原子的。
#[async_trait]
pub trait ModelUsageRepositoryPort: Send + Sync {
    /// 读取记录，不存在时以默认值 (idle) 创建
    async fn get(&self) -> Result<GenerationStatus, RepositoryError>;

    /// 只更新模型字段，不动状态
    async fn save_models(
        &self,
        llm_model: &str,
        image_model: &str,
        tts_model: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// 当前状态等于 `expected` 时改为 `new_status`，返回是否成功
    async fn compare_and_set_status(
        &self,
        expected: &str,
        new_status: &str,
    ) -> Result<bool, RepositoryError>;

    /// 无条件写入状态，返回之前的状态
    async fn set_status(&self, status: &str) -> Result<String, RepositoryError>;
}
