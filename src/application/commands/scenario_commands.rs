//! Scenario Commands

use uuid::Uuid;

/// 生成情景
#[derive(Debug, Clone)]
pub struct GenerateScenario {
    pub profile_id: Uuid,
    pub llm_model: String,
    pub special_requests: String,
    /// 设置后依次接着生成场景描述和场景图像
    pub chain_image_model: Option<String>,
}

/// 逐个生成场景描述
#[derive(Debug, Clone)]
pub struct GenerateSceneDescriptions {
    pub scenario_id: Uuid,
    pub llm_model: String,
}

/// 为每个场景描述生成一张图像
#[derive(Debug, Clone)]
pub struct GenerateScenarioImages {
    pub scenario_id: Uuid,
    pub image_model: String,
}

/// 一键生成：角色 → 头像 → 情景 → 场景 → 场景图
#[derive(Debug, Clone)]
pub struct SurpriseMe {
    pub llm_model: String,
    pub image_model: String,
    pub special_requests: String,
}
