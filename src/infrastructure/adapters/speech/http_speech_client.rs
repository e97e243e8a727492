//! HTTP Speech Client - 调用外部语音合成服务
//!
//! 实现 SpeechEnginePort，通过 HTTP 调用 OpenAI 兼容的语音接口
//!
//! 外部 API:
//! POST {url}
//! Request: {"model", "input", "voice", "response_format", "speed"}  (JSON)
//! Response: 音频二进制

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::fs;

use crate::application::ports::{SpeechError, SpeechEnginePort, SpeechRequest, SpeechResponse};

/// 语音请求体 (JSON)
#[derive(Debug, Serialize)]
struct SpeechHttpRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

/// HTTP 语音客户端配置
#[derive(Debug, Clone)]
pub struct HttpSpeechClientConfig {
    /// 合成接口完整 URL
    pub url: String,
    /// 默认模型
    pub model: String,
    /// 默认音色
    pub voice: String,
    /// 音频格式，同时作为文件扩展名
    pub response_format: String,
    pub speed: f32,
    /// 音频保存目录
    pub output_dir: PathBuf,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpSpeechClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5005/v1/audio/speech".to_string(),
            model: "orpheus".to_string(),
            voice: String::new(),
            response_format: "wav".to_string(),
            speed: 0.5,
            output_dir: PathBuf::from("./data/speech"),
            timeout_secs: 120,
        }
    }
}

impl HttpSpeechClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\*.*?\*").expect("action regex"))
}

fn newlines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n+").expect("newline regex"))
}

/// 去掉 `*动作描写*` 并把换行折叠为空格，只朗读台词
pub fn strip_action_text(content: &str) -> String {
    let without_actions = action_re().replace_all(content, "");
    newlines_re()
        .replace_all(&without_actions, " ")
        .trim()
        .to_string()
}

/// HTTP 语音客户端
pub struct HttpSpeechClient {
    client: Client,
    config: HttpSpeechClientConfig,
}

impl HttpSpeechClient {
    pub fn new(config: HttpSpeechClientConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SpeechError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn audio_path(&self) -> PathBuf {
        self.config.output_dir.join(format!(
            "{}.{}",
            chrono::Utc::now().timestamp_millis(),
            self.config.response_format
        ))
    }
}

#[async_trait]
impl SpeechEnginePort for HttpSpeechClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, SpeechError> {
        let input = strip_action_text(&request.text);
        if input.is_empty() {
            return Err(SpeechError::EmptyInput(
                "nothing to speak after removing action text".to_string(),
            ));
        }

        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let voice = request.voice.as_deref().unwrap_or(&self.config.voice);
        let body = SpeechHttpRequest {
            model,
            input: &input,
            voice,
            response_format: &self.config.response_format,
            speed: self.config.speed,
        };

        tracing::debug!(
            url = %self.config.url,
            model = %model,
            voice = %voice,
            text_len = input.len(),
            "Sending speech request"
        );

        let response = self
            .client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SpeechError::Timeout
                } else if e.is_connect() {
                    SpeechError::NetworkError(format!("Cannot connect to speech service: {}", e))
                } else {
                    SpeechError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SpeechError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| SpeechError::InvalidResponse(format!("Failed to read audio: {}", e)))?;

        if audio_data.is_empty() {
            return Err(SpeechError::InvalidResponse("empty audio body".to_string()));
        }

        fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| SpeechError::IoError(e.to_string()))?;

        let audio_path = self.audio_path();
        fs::write(&audio_path, &audio_data)
            .await
            .map_err(|e| SpeechError::IoError(e.to_string()))?;

        tracing::info!(
            path = %audio_path.display(),
            audio_size = audio_data.len(),
            "Speech saved"
        );

        Ok(SpeechResponse {
            audio_path,
            size_bytes: audio_data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/audio/speech", addr)
    }

    #[test]
    fn test_config_builder() {
        let config = HttpSpeechClientConfig::new("http://example.com:9000/speech").with_timeout(60);
        assert_eq!(config.url, "http://example.com:9000/speech");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.response_format, "wav");
    }

    #[test]
    fn test_strip_action_text() {
        assert_eq!(
            strip_action_text("*smiles warmly*\nHello there.\n\n*waves* Bye!"),
            "Hello there. Bye!"
        );
        assert_eq!(strip_action_text("*only\nactions*"), "");
        assert_eq!(strip_action_text("plain"), "plain");
    }

    #[tokio::test]
    async fn test_synthesize_writes_audio() {
        let seen = Arc::new(Mutex::new(None::<Value>));
        let recorder = seen.clone();
        let router = Router::new().route(
            "/v1/audio/speech",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = Some(body);
                    vec![1u8, 2, 3, 4]
                }
            }),
        );
        let url = spawn_server(router).await;
        let temp_dir = tempdir().unwrap();
        let client = HttpSpeechClient::new(
            HttpSpeechClientConfig::new(url).with_output_dir(temp_dir.path().join("speech")),
        )
        .unwrap();

        let response = client
            .synthesize(SpeechRequest {
                text: "*laughs* Of course!".to_string(),
                model: None,
                voice: Some("tara".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.size_bytes, 4);
        assert_eq!(std::fs::read(&response.audio_path).unwrap(), [1, 2, 3, 4]);
        assert_eq!(
            response.audio_path.extension().and_then(|e| e.to_str()),
            Some("wav")
        );

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["input"], "Of course!");
        assert_eq!(body["model"], "orpheus");
        assert_eq!(body["voice"], "tara");
        assert_eq!(body["response_format"], "wav");
    }

    #[tokio::test]
    async fn test_service_error() {
        let router = Router::new().route(
            "/v1/audio/speech",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading") }),
        );
        let url = spawn_server(router).await;
        let temp_dir = tempdir().unwrap();
        let client =
            HttpSpeechClient::new(HttpSpeechClientConfig::new(url).with_output_dir(temp_dir.path()))
                .unwrap();

        let result = client
            .synthesize(SpeechRequest {
                text: "hello".to_string(),
                model: None,
                voice: None,
            })
            .await;
        assert!(matches!(result, Err(SpeechError::ServiceError(_))));
    }
}
