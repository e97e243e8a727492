//! Status Commands

/// 选择当前模型
#[derive(Debug, Clone)]
pub struct SetModels {
    pub llm_model: String,
    pub image_model: String,
    pub tts_model: Option<String>,
}

/// 运维恢复：强制置为空闲
#[derive(Debug, Clone, Default)]
pub struct ForceIdle;
