//! Speech Engine Port - 语音合成抽象
//!
//! 具体实现在 infrastructure/adapters/speech 层

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// 语音合成错误
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    IoError(String),

    /// 去除动作描写后没有可朗读的文本
    #[error("Empty input: {0}")]
    EmptyInput(String),
}

/// 语音合成请求
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    /// 要朗读的文本
    pub text: String,
    /// 模型；为空时使用配置的默认模型
    pub model: Option<String>,
    /// 音色；为空时使用配置的默认音色
    pub voice: Option<String>,
}

/// 语音合成结果
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    /// 本地音频文件
    pub audio_path: PathBuf,
    pub size_bytes: usize,
}

/// Speech Engine Port
#[async_trait]
pub trait SpeechEnginePort: Send + Sync {
    /// 合成语音并写入本地文件
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, SpeechError>;
}
