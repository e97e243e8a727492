//! 应用层错误定义
//!
//! 统一的命令/查询错误类型。"忙" 不是错误，见 `gate::StageOutcome`。

use thiserror::Error;
use uuid::Uuid;

use crate::application::ports::{
    ImageError, InferenceError, RepositoryError, SpeechError,
};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: Uuid,
    },

    /// 必需的输入字段为空
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// 目标还原请求没有可用种子
    #[error("No reproducible seed available: {0}")]
    PreconditionSeedMissing(String),

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 限流 / 连接失败（推理客户端已重试）
    #[error("Transient provider error: {0}")]
    TransientProvider(String),

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Malformed structured output: {0}")]
    MalformedStructuredOutput(String),

    /// 图像通道未产出任何图像
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: Uuid) -> Self {
        Self::NotFound { resource_type, id }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// 阶段级重试是否值得再试一次
    pub fn is_stage_retryable(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::ExternalServiceError(_) | Self::TransientProvider(_)
        )
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        Self::RepositoryError(err.to_string())
    }
}

impl From<InferenceError> for ApplicationError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ContentFiltered => Self::ContentFiltered(err.to_string()),
            InferenceError::MalformedStructuredOutput(msg) => Self::MalformedStructuredOutput(msg),
            e if e.is_transient() => Self::TransientProvider(e.to_string()),
            e => Self::ExternalServiceError(e.to_string()),
        }
    }
}

impl From<ImageError> for ApplicationError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Protocol(_) | ImageError::ModelSelection(_) => Self::Protocol(err.to_string()),
            ImageError::Io(msg) => Self::StorageError(msg),
            e => Self::ExternalServiceError(e.to_string()),
        }
    }
}

impl From<SpeechError> for ApplicationError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::IoError(msg) => Self::StorageError(msg),
            SpeechError::EmptyInput(msg) => Self::PreconditionFailed(msg),
            e => Self::ExternalServiceError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_mapping() {
        assert!(matches!(
            ApplicationError::from(InferenceError::ContentFiltered),
            ApplicationError::ContentFiltered(_)
        ));
        assert!(matches!(
            ApplicationError::from(InferenceError::RateLimited("slow down".into())),
            ApplicationError::TransientProvider(_)
        ));
        assert!(matches!(
            ApplicationError::from(InferenceError::MalformedStructuredOutput("x".into())),
            ApplicationError::MalformedStructuredOutput(_)
        ));
        assert!(matches!(
            ApplicationError::from(InferenceError::ModelNotFound("m".into())),
            ApplicationError::ExternalServiceError(_)
        ));
    }

    #[test]
    fn test_stage_retryable() {
        assert!(ApplicationError::Protocol("empty".into()).is_stage_retryable());
        assert!(!ApplicationError::precondition("missing").is_stage_retryable());
        assert!(!ApplicationError::ContentFiltered("x".into()).is_stage_retryable());
    }
}
