//! Profile / Scenario Queries

use uuid::Uuid;

/// 获取角色设定
#[derive(Debug, Clone)]
pub struct GetProfile {
    pub profile_id: Uuid,
}

/// 列出所有角色设定
#[derive(Debug, Clone)]
pub struct ListProfiles;

/// 获取情景
#[derive(Debug, Clone)]
pub struct GetScenario {
    pub scenario_id: Uuid,
}

/// 列出某个角色的情景
#[derive(Debug, Clone)]
pub struct ListScenarios {
    pub profile_id: Uuid,
}

/// 获取情景的对话记录
#[derive(Debug, Clone)]
pub struct GetMessages {
    pub scenario_id: Uuid,
}
