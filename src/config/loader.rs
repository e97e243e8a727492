//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, RetryConfig};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 阶段级重试次数上限
const MAX_STAGE_ATTEMPTS: u32 = 3;

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `STORYFORGE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `STORYFORGE_SERVER__PORT=8080`
/// - `STORYFORGE_INFERENCE__BASE_URL=http://llm:11434`
/// - `STORYFORGE_INFERENCE__STRUCTURED_OUTPUT=coerce`
/// - `STORYFORGE_IMAGE__WS_URL=ws://swarm:7801`
/// - `STORYFORGE_ORCHESTRATOR__STAGE_RETRY__MAX_ATTEMPTS=3`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// `config_path` 为 None 时使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 缺省值由各结构体的 serde default 提供
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("STORYFORGE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn require_non_empty(value: &str, name: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} cannot be empty",
            name
        )));
    }
    Ok(())
}

fn require_attempts(retry: &RetryConfig, name: &str) -> Result<(), ConfigError> {
    if retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{} max_attempts cannot be 0",
            name
        )));
    }
    Ok(())
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    require_non_empty(&config.inference.base_url, "Inference base URL")?;
    require_non_empty(&config.image.base_url, "Image base URL")?;
    require_non_empty(&config.image.ws_url, "Image WebSocket URL")?;
    require_non_empty(&config.speech.url, "Speech URL")?;
    require_non_empty(&config.database.path, "Database path")?;

    require_attempts(&config.inference.retry, "Inference retry")?;

    let stage_attempts = config.orchestrator.stage_retry.max_attempts;
    if !(1..=MAX_STAGE_ATTEMPTS).contains(&stage_attempts) {
        return Err(ConfigError::ValidationError(format!(
            "Stage retry max_attempts must be between 1 and {}, got {}",
            MAX_STAGE_ATTEMPTS, stage_attempts
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Inference URL: {}", config.inference.base_url);
    tracing::info!(
        "Inference: structured_output={:?}, retry={}x{}s, coercion_retries={}, timeout={}s",
        config.inference.structured_output,
        config.inference.retry.max_attempts,
        config.inference.retry.delay_secs,
        config.inference.coercion_retries,
        config.inference.timeout_secs
    );
    if config.inference.api_key.is_some() {
        tracing::info!("Inference API Key: set");
    }
    if let Some(model) = &config.embedding.model {
        tracing::info!("Embedding Model: {}", model);
    }
    tracing::info!("Image URL: {} ({})", config.image.base_url, config.image.ws_url);
    tracing::info!("Image Directory: {:?}", config.image.output_dir);
    tracing::info!("Speech URL: {}", config.speech.url);
    tracing::info!("Speech Directory: {:?}", config.speech.output_dir);
    tracing::info!(
        "Stage Retry: {}x{}s",
        config.orchestrator.stage_retry.max_attempts,
        config.orchestrator.stage_retry.delay_secs
    );
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Database Max Connections: {}", config.database.max_connections);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
