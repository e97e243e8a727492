//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::retry::RetryPolicy;
use crate::domain::image::{ImagePresets, PresetParams, DEFAULT_NEGATIVE_PROMPT};
use crate::infrastructure::adapters::StructuredOutputMode;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 语言模型服务
    #[serde(default)]
    pub inference: InferenceConfig,

    /// 向量化
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// 图像渲染服务
    #[serde(default)]
    pub image: ImageConfig,

    /// 语音合成服务
    #[serde(default)]
    pub speech: SpeechConfig,

    /// 阶段编排
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 重试配置（次数 + 固定间隔）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

/// 语言模型服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// 类型化输出方式：auto | native | coerce
    #[serde(default)]
    pub structured_output: StructuredOutputMode,

    /// 限流与连接失败的重试
    #[serde(default = "default_inference_retry")]
    pub retry: RetryConfig,

    /// 强制模式下的重问次数
    #[serde(default = "default_coercion_retries")]
    pub coercion_retries: u32,

    /// 请求超时时间（秒）
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

fn default_inference_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_inference_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 6,
        delay_secs: 60,
    }
}

fn default_coercion_retries() -> u32 {
    3
}

fn default_inference_timeout() -> u64 {
    300
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_inference_url(),
            api_key: None,
            structured_output: StructuredOutputMode::default(),
            retry: default_inference_retry(),
            coercion_retries: default_coercion_retries(),
            timeout_secs: default_inference_timeout(),
        }
    }
}

/// 向量化配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingConfig {
    /// 未设置时使用对话模型
    #[serde(default)]
    pub model: Option<String>,
}

/// 图像预设配置
#[derive(Debug, Clone, Deserialize)]
pub struct PresetsConfig {
    #[serde(default = "PresetParams::seed_search")]
    pub seed_search: PresetParams,

    #[serde(default = "PresetParams::target")]
    pub target: PresetParams,

    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,
}

fn default_negative_prompt() -> String {
    DEFAULT_NEGATIVE_PROMPT.to_string()
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            seed_search: PresetParams::seed_search(),
            target: PresetParams::target(),
            negative_prompt: default_negative_prompt(),
        }
    }
}

impl From<&PresetsConfig> for ImagePresets {
    fn from(config: &PresetsConfig) -> Self {
        Self {
            seed_search: config.seed_search.clone(),
            target: config.target.clone(),
            negative_prompt: config.negative_prompt.clone(),
        }
    }
}

/// 图像渲染服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_url")]
    pub base_url: String,

    #[serde(default = "default_image_ws_url")]
    pub ws_url: String,

    /// 等待会话可用的最长时间（秒）
    #[serde(default = "default_session_wait")]
    pub session_wait_secs: u64,

    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,

    /// 图像下载目录
    #[serde(default = "default_image_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub presets: PresetsConfig,
}

fn default_image_url() -> String {
    "http://localhost:7801".to_string()
}

fn default_image_ws_url() -> String {
    "ws://localhost:7801".to_string()
}

fn default_session_wait() -> u64 {
    60
}

fn default_image_timeout() -> u64 {
    300
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("data/images")
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: default_image_url(),
            ws_url: default_image_ws_url(),
            session_wait_secs: default_session_wait(),
            timeout_secs: default_image_timeout(),
            output_dir: default_image_dir(),
            presets: PresetsConfig::default(),
        }
    }
}

/// 语音合成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// 合成接口完整 URL
    #[serde(default = "default_speech_url")]
    pub url: String,

    #[serde(default = "default_speech_model")]
    pub model: String,

    #[serde(default)]
    pub voice: String,

    #[serde(default = "default_response_format")]
    pub response_format: String,

    #[serde(default = "default_speed")]
    pub speed: f32,

    /// 音频保存目录
    #[serde(default = "default_speech_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,
}

fn default_speech_url() -> String {
    "http://localhost:5005/v1/audio/speech".to_string()
}

fn default_speech_model() -> String {
    "orpheus".to_string()
}

fn default_response_format() -> String {
    "wav".to_string()
}

fn default_speed() -> f32 {
    0.5
}

fn default_speech_dir() -> PathBuf {
    PathBuf::from("data/speech")
}

fn default_speech_timeout() -> u64 {
    120
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: default_speech_url(),
            model: default_speech_model(),
            voice: String::new(),
            response_format: default_response_format(),
            speed: default_speed(),
            output_dir: default_speech_dir(),
            timeout_secs: default_speech_timeout(),
        }
    }
}

/// 阶段编排配置
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// 阶段级重试，只包裹门内的外部调用
    #[serde(default = "default_stage_retry")]
    pub stage_retry: RetryConfig,
}

fn default_stage_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        delay_secs: 30,
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_retry: default_stage_retry(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/storyforge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
