//! HTTP Inference Client - 调用 OpenAI 兼容的文本生成服务
//!
//! 实现 InferenceEnginePort / InferenceProviderPort
//!
//! 外部 API:
//! POST {base}/v1/chat/completions  {model, messages[], response_format?}
//! POST {base}/v1/embeddings        {model, input[]}
//! GET  {base}/api/tags             模型列表（同时用于能力探测）
//!
//! 结构化输出有两条路径：
//! - 原生：请求附带 JSON Schema，直接解析返回文本
//! - 强制：追加格式说明，用提取器恢复 JSON，不合规时把原因反馈给模型重问

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::model_listing::{wire_model_name, ModelEntry, ModelListing};
use crate::application::ports::{
    InferenceEnginePort, InferenceError, InferenceOutput, InferenceProviderPort,
};
use crate::application::retry::{retry_with_fixed_delay, RetryPolicy};
use crate::domain::{
    extract_structured, parse_structure, remove_thinking, ChatMessage, OutputSchema,
};

const CHAT_PATH: &str = "/v1/chat/completions";
const EMBEDDINGS_PATH: &str = "/v1/embeddings";
const MODELS_PATH: &str = "/api/tags";

/// 结构化输出模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredOutputMode {
    /// 按模型列表中的能力信息探测
    #[default]
    Auto,
    Native,
    Coerce,
}

/// HTTP 推理客户端配置
#[derive(Debug, Clone)]
pub struct HttpInferenceConfig {
    /// 服务基础 URL
    pub base_url: String,
    pub api_key: Option<String>,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 瞬时错误（限流、连接失败）的重试策略
    pub retry: RetryPolicy,
    /// 强制模式下的重问次数
    pub coercion_retries: u32,
    pub structured_output: StructuredOutputMode,
    /// 向量化模型；未设置时使用对话模型
    pub embedding_model: Option<String>,
}

impl Default for HttpInferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: 300,
            retry: RetryPolicy::new(6, Duration::from_secs(60)),
            coercion_retries: 3,
            structured_output: StructuredOutputMode::Auto,
            embedding_model: None,
        }
    }
}

impl HttpInferenceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_structured_output(mut self, mode: StructuredOutputMode) -> Self {
        self.structured_output = mode;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

// ============================================================================
// 线上格式
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

// ============================================================================
// 共享的 HTTP 调用
// ============================================================================

fn authorized(
    builder: reqwest::RequestBuilder,
    config: &HttpInferenceConfig,
) -> reqwest::RequestBuilder {
    match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => builder.bearer_auth(key),
        None => builder,
    }
}

fn map_send_error(e: reqwest::Error) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Connection(format!("request timed out: {}", e))
    } else if e.is_connect() {
        InferenceError::Connection(format!("cannot connect to inference service: {}", e))
    } else {
        InferenceError::Connection(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(InferenceError::RateLimited(body))
    } else {
        Err(InferenceError::Service {
            status: status.as_u16(),
            body,
        })
    }
}

async fn fetch_model_listing(
    http: &Client,
    config: &HttpInferenceConfig,
) -> Result<Vec<ModelEntry>, InferenceError> {
    let response = authorized(http.get(config.url(MODELS_PATH)), config)
        .send()
        .await
        .map_err(map_send_error)?;
    let listing: ModelListing = check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| InferenceError::InvalidResponse(format!("model listing: {}", e)))?;
    Ok(listing.into_entries())
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn coercion_instructions(schema: &OutputSchema) -> String {
    let mut text = String::from(
        "Reply with a single JSON object and nothing else: no prose, no code fences. \
Use double quotes for keys and strings. The object must match this JSON schema:\n",
    );
    text.push_str(&schema.json_schema().to_string());
    text.push_str("\nFields:\n");
    for field in &schema.fields {
        text.push_str(&format!("- {}: {}\n", field.name, field.description));
    }
    text
}

// ============================================================================
// HttpInferenceClient
// ============================================================================

struct Completion {
    content: String,
    finish_reason: Option<String>,
}

/// 绑定到单个模型的推理客户端
pub struct HttpInferenceClient {
    http: Client,
    config: Arc<HttpInferenceConfig>,
    model: String,
    wire_model: String,
    native_schema: bool,
}

impl HttpInferenceClient {
    /// 创建客户端并探测类型化输出能力；探测失败即构造失败
    pub async fn connect(
        http: Client,
        config: Arc<HttpInferenceConfig>,
        model: &str,
    ) -> Result<Self, InferenceError> {
        let wire_model = wire_model_name(model).to_string();

        let native_schema = match config.structured_output {
            StructuredOutputMode::Native => true,
            StructuredOutputMode::Coerce => false,
            StructuredOutputMode::Auto => {
                let entries = fetch_model_listing(&http, &config).await?;
                entries
                    .iter()
                    .find(|e| e.matches(&wire_model))
                    .map(ModelEntry::supports_native_schema)
                    .ok_or_else(|| InferenceError::ModelNotFound(model.to_string()))?
            }
        };

        tracing::info!(
            model = %model,
            native_schema,
            "Inference client ready"
        );

        Ok(Self {
            http,
            config,
            model: model.to_string(),
            wire_model,
            native_schema,
        })
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        response_format: Option<Value>,
    ) -> Result<Completion, InferenceError> {
        let body = ChatCompletionRequest {
            model: &self.wire_model,
            messages,
            response_format,
            stream: false,
        };

        tracing::debug!(
            model = %self.wire_model,
            messages = messages.len(),
            typed = body.response_format.is_some(),
            "Sending chat completion request"
        );

        let response = authorized(self.http.post(self.config.url(CHAT_PATH)), &self.config)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let parsed: ChatCompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::InvalidResponse("no completion choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            tracing::warn!(model = %self.wire_model, "Completion stopped by content filter");
            return Err(InferenceError::ContentFiltered);
        }

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    async fn generate_once(
        &self,
        messages: &[ChatMessage],
        schema: Option<&OutputSchema>,
    ) -> Result<InferenceOutput, InferenceError> {
        let schema = match schema {
            None => {
                let completion = self.complete(messages, None).await?;
                return Ok(InferenceOutput::Text(completion.content));
            }
            Some(schema) => schema,
        };

        if !self.native_schema {
            return self.coerce(messages, schema).await.map(InferenceOutput::Structured);
        }

        let completion = self
            .complete(messages, Some(schema.response_format()))
            .await?;
        let value = parse_structure(&completion.content)
            .or_else(|| extract_structured(&completion.content))
            .ok_or_else(|| {
                InferenceError::MalformedStructuredOutput(format!(
                    "unparseable completion (finish_reason={:?}): {}",
                    completion.finish_reason,
                    preview(&completion.content)
                ))
            })?;
        let map = schema
            .validate(value)
            .map_err(|e| InferenceError::MalformedStructuredOutput(e.to_string()))?;
        Ok(InferenceOutput::Structured(map))
    }

    /// 强制结构化：提取 + 校验，不合规时带上原因重问
    async fn coerce(
        &self,
        messages: &[ChatMessage],
        schema: &OutputSchema,
    ) -> Result<Map<String, Value>, InferenceError> {
        let mut conversation = messages.to_vec();
        conversation.push(ChatMessage::system(coercion_instructions(schema)));

        let attempts = self.config.coercion_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let completion = self
                .complete(&conversation, Some(json!({"type": "json_object"})))
                .await?;
            let content = remove_thinking(&completion.content);

            let verdict = extract_structured(&content)
                .ok_or_else(|| "reply contained no parseable JSON object".to_string())
                .and_then(|value| schema.validate(value).map_err(|e| e.to_string()));

            match verdict {
                Ok(map) => return Ok(map),
                Err(reason) => {
                    tracing::debug!(
                        model = %self.wire_model,
                        attempt,
                        reason = %reason,
                        "Structured output rejected, asking again"
                    );
                    conversation.push(ChatMessage::user(format!(
                        "Your previous reply was:\n{}\nIt was rejected: {}. Reply again with only the JSON object.",
                        preview(&content),
                        reason
                    )));
                    last_error = reason;
                }
            }
        }

        Err(InferenceError::CoercionExhausted {
            attempts,
            last_error,
        })
    }

    async fn embed_once(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, InferenceError> {
        let model = self
            .config
            .embedding_model
            .as_deref()
            .unwrap_or(&self.wire_model);
        let body = EmbeddingRequest {
            model,
            input: inputs,
        };

        let response = authorized(self.http.post(self.config.url(EMBEDDINGS_PATH)), &self.config)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let parsed: EmbeddingResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != inputs.len() {
            return Err(InferenceError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl InferenceEnginePort for HttpInferenceClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_native_schema(&self) -> bool {
        self.native_schema
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&OutputSchema>,
    ) -> Result<InferenceOutput, InferenceError> {
        retry_with_fixed_delay(
            &self.config.retry,
            "chat completion",
            InferenceError::is_transient,
            move || async move { self.generate_once(messages, schema).await },
        )
        .await
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, InferenceError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        retry_with_fixed_delay(
            &self.config.retry,
            "embedding",
            InferenceError::is_transient,
            move || async move { self.embed_once(inputs).await },
        )
        .await
    }
}

// ============================================================================
// HttpInferenceProvider
// ============================================================================

/// 按模型名缓存客户端（能力探测每个模型只做一次）
pub struct HttpInferenceProvider {
    http: Client,
    config: Arc<HttpInferenceConfig>,
    clients: DashMap<String, Arc<HttpInferenceClient>>,
}

impl HttpInferenceProvider {
    pub fn new(config: HttpInferenceConfig) -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            config: Arc::new(config),
            clients: DashMap::new(),
        })
    }
}

#[async_trait]
impl InferenceProviderPort for HttpInferenceProvider {
    async fn client(&self, model: &str) -> Result<Arc<dyn InferenceEnginePort>, InferenceError> {
        let cached = self.clients.get(model).map(|entry| entry.value().clone());
        if let Some(client) = cached {
            return Ok(client);
        }

        let client =
            Arc::new(HttpInferenceClient::connect(self.http.clone(), self.config.clone(), model).await?);
        self.clients.insert(model.to_string(), client.clone());
        Ok(client)
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let entries = fetch_model_listing(&self.http, &self.config).await?;
        Ok(entries
            .iter()
            .map(|e| e.name().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }
}
