//! Inference Engine Port - 文本生成 / 向量化引擎抽象
//!
//! 具体实现在 infrastructure/adapters/inference 层

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{ChatMessage, OutputSchema, StructuredOutput};

/// 推理错误
#[derive(Debug, Error)]
pub enum InferenceError {
    /// 服务端限流
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 连接失败 / 超时
    #[error("Connection error: {0}")]
    Connection(String),

    /// 强制结构化模式多次重问仍未得到合规结果
    #[error("Structured output coercion failed after {attempts} attempts: {last_error}")]
    CoercionExhausted { attempts: u32, last_error: String },

    #[error("Completion stopped by content filter")]
    ContentFiltered,

    #[error("Malformed structured output: {0}")]
    MalformedStructuredOutput(String),

    #[error("Service error: HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),
}

impl InferenceError {
    /// 可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InferenceError::RateLimited(_)
                | InferenceError::Connection(_)
                | InferenceError::CoercionExhausted { .. }
        )
    }
}

/// 推理结果
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutput {
    Text(String),
    Structured(Map<String, Value>),
}

/// Inference Engine Port
///
/// 绑定到单个模型的客户端
#[async_trait]
pub trait InferenceEnginePort: Send + Sync {
    fn model_name(&self) -> &str;

    /// 模型是否原生支持类型化输出（构造时探测，之后不变）
    fn supports_native_schema(&self) -> bool;

    /// 发送对话；指定 schema 时返回符合 schema 的对象
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&OutputSchema>,
    ) -> Result<InferenceOutput, InferenceError>;

    /// 文本向量化
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, InferenceError>;
}

/// Inference Provider Port
///
/// 按模型名提供客户端，并列出可用模型
#[async_trait]
pub trait InferenceProviderPort: Send + Sync {
    async fn client(&self, model: &str) -> Result<Arc<dyn InferenceEnginePort>, InferenceError>;

    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;
}

/// 生成自由文本
pub async fn generate_text(
    engine: &dyn InferenceEnginePort,
    messages: &[ChatMessage],
) -> Result<String, InferenceError> {
    match engine.generate(messages, None).await? {
        InferenceOutput::Text(text) => Ok(text),
        InferenceOutput::Structured(_) => Err(InferenceError::InvalidResponse(
            "expected text, got structured output".to_string(),
        )),
    }
}

/// 生成类型化结果
pub async fn generate_structured<T: StructuredOutput>(
    engine: &dyn InferenceEnginePort,
    messages: &[ChatMessage],
) -> Result<T, InferenceError> {
    let schema = T::schema();
    match engine.generate(messages, Some(&schema)).await? {
        InferenceOutput::Structured(map) => serde_json::from_value(Value::Object(map))
            .map_err(|e| InferenceError::MalformedStructuredOutput(e.to_string())),
        InferenceOutput::Text(_) => Err(InferenceError::InvalidResponse(
            "expected structured output, got text".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(InferenceError::RateLimited("429".into()).is_transient());
        assert!(InferenceError::Connection("refused".into()).is_transient());
        assert!(InferenceError::CoercionExhausted {
            attempts: 3,
            last_error: "missing field".into()
        }
        .is_transient());

        assert!(!InferenceError::ContentFiltered.is_transient());
        assert!(!InferenceError::MalformedStructuredOutput("x".into()).is_transient());
        assert!(!InferenceError::Service {
            status: 500,
            body: String::new()
        }
        .is_transient());
    }
}
