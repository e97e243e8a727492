//! Swarm Image Client - 流式图像渲染协议客户端
//!
//! 实现 ImageEnginePort
//!
//! 外部 API:
//! POST {base}/API/GetNewSession         {}                              -> {session_id}
//! POST {base}/API/ListModels            {session_id, path, depth}       -> {files: [{name}]}
//! WS   {ws}/API/SelectModelWS           {session_id, model}             -> ... {success: true}
//! WS   {ws}/API/GenerateText2ImageWS    {session_id, ...request}        -> status / gen_progress / image 帧
//!
//! 每次调用都新建会话；生成通道提前关闭时返回已收到的图像。

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::connect_async;

use super::image_store::ImageStore;
use crate::application::ports::{ImageEnginePort, ImageError};
use crate::domain::image::{
    decode_frame, BatchProgress, FrameError, ImageGenerationEvent, ImageGenerationRequest,
    ProtocolState,
};

const SESSION_PATH: &str = "/API/GetNewSession";
const LIST_MODELS_PATH: &str = "/API/ListModels";
const SELECT_MODEL_WS_PATH: &str = "/API/SelectModelWS";
const GENERATE_WS_PATH: &str = "/API/GenerateText2ImageWS";
const SESSION_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// 渲染服务客户端配置
#[derive(Debug, Clone)]
pub struct SwarmClientConfig {
    /// HTTP 基础 URL（同时用于解析图像引用）
    pub base_url: String,
    /// WebSocket 基础 URL
    pub ws_url: String,
    /// 会话创建的最长等待时间（秒），每秒重试一次
    pub session_wait_secs: u64,
    /// HTTP 请求超时，同时作为通道上两帧之间的最长间隔（秒）
    pub timeout_secs: u64,
    /// 下载目录
    pub output_dir: PathBuf,
}

impl Default for SwarmClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7801".to_string(),
            ws_url: "ws://localhost:7801".to_string(),
            session_wait_secs: 60,
            timeout_secs: 300,
            output_dir: PathBuf::from("./data/images"),
        }
    }
}

impl SwarmClientConfig {
    pub fn new(base_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_session_wait(mut self, secs: u64) -> Self {
        self.session_wait_secs = secs;
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn socket_url(&self, path: &str) -> String {
        format!("{}{}", self.ws_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    files: Vec<ModelFile>,
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateCommand<'a> {
    session_id: &'a str,
    #[serde(flatten)]
    request: &'a ImageGenerationRequest,
}

/// 记录协议状态迁移
fn advance(state: &mut ProtocolState, next: ProtocolState) {
    tracing::debug!(from = ?*state, to = ?next, "Image protocol transition");
    *state = next;
}

/// 生成通道读取循环
///
/// 按到达顺序收集图像引用。最后一批进度到 100% 之后的下一张图像结束循环；
/// 通道出错、关闭、超时或服务端报错时提前结束，返回已收到的部分。
/// 空帧和无法解码的帧被跳过。
pub async fn collect_images<S>(stream: &mut S, requested_images: u32, idle_timeout: Duration) -> Vec<String>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut progress = BatchProgress::new(requested_images);

    loop {
        let frame = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                tracing::warn!(error = %e, "Generation channel error");
                break;
            }
            Ok(None) => {
                tracing::warn!("Generation channel ended before completion");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = idle_timeout.as_secs(),
                    "Generation channel idle, giving up"
                );
                break;
            }
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(reason) => {
                tracing::warn!(reason = ?reason, "Generation channel closed before completion");
                break;
            }
            _ => continue,
        };

        let events = match decode_frame(&text) {
            Ok(events) => events,
            Err(FrameError::Remote(message)) => {
                tracing::warn!(error = %message, "Renderer reported an error");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping frame");
                continue;
            }
        };

        for event in events {
            match &event {
                ImageGenerationEvent::Status(status) => {
                    tracing::debug!(status = %status, "Renderer status");
                }
                ImageGenerationEvent::Progress {
                    batch_index,
                    overall_percent,
                    current_percent,
                } => {
                    tracing::debug!(
                        batch_index,
                        overall_percent,
                        current_percent,
                        "Generation progress"
                    );
                }
                ImageGenerationEvent::Image { path } => {
                    tracing::debug!(path = %path, "Image received");
                }
            }

            if progress.apply(event) {
                return progress.into_images();
            }
        }
    }

    progress.into_images()
}

/// 渲染服务客户端
pub struct SwarmImageClient {
    http: Client,
    config: SwarmClientConfig,
    store: ImageStore,
}

impl SwarmImageClient {
    pub async fn new(config: SwarmClientConfig) -> Result<Self, ImageError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ImageError::Network(e.to_string()))?;

        let store = ImageStore::new(http.clone(), &config.base_url, &config.output_dir).await?;

        Ok(Self {
            http,
            config,
            store,
        })
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }

    /// 创建会话；连接失败每秒重试一次，直到等待时限
    ///
    /// 时限按墙钟计算，每次请求最多等待剩余时间。
    async fn new_session(&self) -> Result<String, ImageError> {
        let url = self.config.api_url(SESSION_PATH);
        let budget = Duration::from_secs(self.config.session_wait_secs.max(1));
        let deadline = Instant::now() + budget;
        let mut attempt = 0u32;
        let mut last_error = String::from("no attempt made");

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            attempt += 1;

            let sent = tokio::time::timeout(
                remaining,
                self.http.post(&url).json(&json!({})).send(),
            )
            .await;

            match sent {
                Ok(Ok(response)) if response.status().is_success() => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let body: SessionResponse = tokio::time::timeout(remaining, response.json())
                        .await
                        .map_err(|_| {
                            ImageError::SessionUnavailable(format!(
                                "session response not received within {}s",
                                budget.as_secs()
                            ))
                        })?
                        .map_err(|e| ImageError::SessionUnavailable(e.to_string()))?;
                    return body
                        .session_id
                        .filter(|id| !id.is_empty())
                        .ok_or_else(|| {
                            ImageError::SessionUnavailable("response has no session_id".to_string())
                        });
                }
                Ok(Ok(response)) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ImageError::Service { status, body });
                }
                Ok(Err(e)) => {
                    tracing::debug!(attempt, error = %e, "Renderer not reachable yet");
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::debug!(attempt, "Renderer did not answer before the session deadline");
                    last_error = "request timed out".to_string();
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(remaining.min(SESSION_RETRY_INTERVAL)).await;
        }

        Err(ImageError::SessionUnavailable(format!(
            "no session after {}s ({} attempts): {}",
            budget.as_secs(),
            attempt,
            last_error
        )))
    }

    /// 通过双工通道加载模型，读到 success 为止
    async fn select_model(&self, session_id: &str, model: &str) -> Result<(), ImageError> {
        let url = self.config.socket_url(SELECT_MODEL_WS_PATH);
        let (mut socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ImageError::ModelSelection(format!("cannot connect to {}: {}", url, e)))?;

        let command = json!({"session_id": session_id, "model": model});
        socket
            .send(Message::Text(command.to_string()))
            .await
            .map_err(|e| ImageError::ModelSelection(e.to_string()))?;

        let result = loop {
            let frame = match tokio::time::timeout(self.idle_timeout(), socket.next()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(e))) => break Err(ImageError::ModelSelection(e.to_string())),
                Ok(None) => {
                    break Err(ImageError::ModelSelection(
                        "channel ended before model was loaded".to_string(),
                    ))
                }
                Err(_) => break Err(ImageError::ModelSelection("timed out".to_string())),
            };

            match frame {
                Message::Text(text) => {
                    let value: serde_json::Value = match serde_json::from_str(&text) {
                        Ok(value) => value,
                        Err(_) => continue,
                    };
                    if value.get("success").and_then(|v| v.as_bool()) == Some(true) {
                        break Ok(());
                    }
                    if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
                        break Err(ImageError::ModelSelection(error.to_string()));
                    }
                    tracing::debug!(frame = %text, "Waiting for model selection");
                }
                Message::Close(_) => {
                    break Err(ImageError::ModelSelection(
                        "channel closed before model was loaded".to_string(),
                    ))
                }
                _ => {}
            }
        };

        let _ = socket.close(None).await;
        result
    }

    /// 打开生成通道并收集图像引用
    async fn render(
        &self,
        session_id: &str,
        request: &ImageGenerationRequest,
    ) -> Result<Vec<String>, ImageError> {
        let url = self.config.socket_url(GENERATE_WS_PATH);
        let (mut socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ImageError::Protocol(format!("cannot connect to {}: {}", url, e)))?;

        let command = serde_json::to_string(&GenerateCommand {
            session_id,
            request,
        })
        .map_err(|e| ImageError::Protocol(e.to_string()))?;

        socket
            .send(Message::Text(command))
            .await
            .map_err(|e| ImageError::Protocol(e.to_string()))?;

        let references = collect_images(&mut socket, request.images, self.idle_timeout()).await;
        let _ = socket.close(None).await;
        Ok(references)
    }
}

#[async_trait]
impl ImageEnginePort for SwarmImageClient {
    async fn generate(&self, request: &ImageGenerationRequest) -> Result<Vec<String>, ImageError> {
        let mut state = ProtocolState::NoSession;

        advance(&mut state, ProtocolState::SessionRequested);
        let session_id = match self.new_session().await {
            Ok(id) => id,
            Err(e) => {
                advance(&mut state, ProtocolState::Failed);
                return Err(e);
            }
        };
        advance(&mut state, ProtocolState::SessionActive);

        advance(&mut state, ProtocolState::ModelSelecting);
        if let Err(e) = self.select_model(&session_id, &request.model).await {
            advance(&mut state, ProtocolState::Failed);
            return Err(e);
        }
        advance(&mut state, ProtocolState::ModelSelected);

        advance(&mut state, ProtocolState::Generating);
        let references = match self.render(&session_id, request).await {
            Ok(references) => references,
            Err(e) => {
                advance(&mut state, ProtocolState::Failed);
                return Err(e);
            }
        };
        advance(
            &mut state,
            if references.is_empty() {
                ProtocolState::Failed
            } else {
                ProtocolState::Complete
            },
        );

        let mut paths = Vec::with_capacity(references.len());
        for reference in &references {
            match self.store.download(reference).await {
                Ok(path) => paths.push(path),
                Err(e) => tracing::warn!(reference = %reference, error = %e, "Skipping image"),
            }
        }

        tracing::info!(
            model = %request.model,
            requested = request.images,
            received = references.len(),
            saved = paths.len(),
            seed = request.seed,
            "Image generation finished"
        );

        Ok(paths)
    }

    async fn list_models(&self) -> Result<Vec<String>, ImageError> {
        let session_id = self.new_session().await?;
        let response = self
            .http
            .post(self.config.api_url(LIST_MODELS_PATH))
            .json(&json!({"session_id": session_id, "path": "", "depth": 2}))
            .send()
            .await
            .map_err(|e| ImageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let listing: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Protocol(e.to_string()))?;
        Ok(listing.files.into_iter().map(|f| f.name).collect())
    }
}
