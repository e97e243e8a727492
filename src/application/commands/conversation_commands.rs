//! Conversation Commands

use uuid::Uuid;

/// 角色回复一条用户消息
#[derive(Debug, Clone)]
pub struct RespondToChat {
    pub scenario_id: Uuid,
    /// 当前场景序号（超出范围时使用最后一个场景）
    pub scene_index: usize,
    pub message: String,
    pub llm_model: String,
}

/// 文本转语音
#[derive(Debug, Clone)]
pub struct GenerateSpeech {
    pub text: String,
    pub model: Option<String>,
    pub voice: Option<String>,
}
