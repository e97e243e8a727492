//! Profile Commands

use uuid::Uuid;

/// 生成角色设定
#[derive(Debug, Clone)]
pub struct GenerateProfile {
    pub llm_model: String,
    pub special_requests: String,
}

/// 由外貌特征生成头像描述
#[derive(Debug, Clone)]
pub struct GenerateProfileImageDescription {
    pub profile_id: Uuid,
    pub llm_model: String,
}

/// 生成一批低保真样图（追加到头像列表）
#[derive(Debug, Clone)]
pub struct GenerateSampleProfileImages {
    pub profile_id: Uuid,
    pub image_model: String,
}

/// 用种子生成主头像（替换头像列表）
///
/// 种子来源优先级：`seed` → `source_image` 文件名 → 已记录的种子
#[derive(Debug, Clone)]
pub struct GenerateMainProfileImage {
    pub profile_id: Uuid,
    pub image_model: String,
    pub seed: Option<i64>,
    pub source_image: Option<String>,
}
