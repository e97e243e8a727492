//! 全局生成状态
//!
//! 进程内唯一的一条记录：当前选择的模型 + 状态文本。
//! 状态为 `idle` 表示空闲；其余任何文本（阶段标签或错误标签）都表示被占用。

use serde::{Deserialize, Serialize};

/// 空闲状态
pub const IDLE: &str = "idle";

/// 错误标签前缀
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub llm_model: String,
    pub image_model: String,
    pub tts_model: Option<String>,
    pub status: String,
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self {
            llm_model: String::new(),
            image_model: String::new(),
            tts_model: None,
            status: IDLE.to_string(),
        }
    }
}

impl GenerationStatus {
    pub fn is_idle(&self) -> bool {
        self.status == IDLE
    }

    pub fn is_error(&self) -> bool {
        self.status.starts_with(ERROR_PREFIX)
    }
}

/// 构造错误标签
pub fn error_label(cause: &str) -> String {
    format!("{}{}", ERROR_PREFIX, cause)
}

/// 生成阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Profile,
    ProfileImageDescription,
    SampleProfileImages,
    MainProfileImage,
    Scenario,
    SceneDescription,
    ScenarioImage,
    ChatReply,
    Speech,
}

impl StageKind {
    /// 占用期间写入状态记录的标签
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Profile => "Generating Profile",
            StageKind::ProfileImageDescription => "Generating Profile Image Description",
            StageKind::SampleProfileImages => "Generating Sample Profile Images",
            StageKind::MainProfileImage => "Generating Main Profile Image",
            StageKind::Scenario => "Generating Scenario",
            StageKind::SceneDescription => "Generating Scenario Description",
            StageKind::ScenarioImage => "Generating Scenario Images",
            StageKind::ChatReply => "Generating Chat Reply",
            StageKind::Speech => "Generating Speech",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let status = GenerationStatus::default();
        assert!(status.is_idle());
        assert!(!status.is_error());
    }

    #[test]
    fn test_error_label() {
        let status = GenerationStatus {
            status: error_label("connection refused"),
            ..Default::default()
        };
        assert_eq!(status.status, "Error: connection refused");
        assert!(status.is_error());
        assert!(!status.is_idle());
    }
}
