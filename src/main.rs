//! StoryForge - 角色与情景生成服务
//!
//! 装配：配置 → 日志 → 数据库 → 外部服务适配器 → 生成门 → HTTP 服务

use std::sync::Arc;

use storyforge::application::{GenerationGate, StageContext};
use storyforge::config::{load_config, print_config, AppConfig};
use storyforge::domain::image::ImagePresets;
use storyforge::infrastructure::adapters::{
    HttpInferenceConfig, HttpInferenceProvider, HttpSpeechClient, HttpSpeechClientConfig,
    SwarmClientConfig, SwarmImageClient,
};
use storyforge::infrastructure::http::{AppState, HttpServer, ServerConfig};
use storyforge::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteMessageRepository,
    SqliteModelUsageRepository, SqliteProfileRepository, SqliteScenarioRepository,
};

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},storyforge={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("StoryForge - character & scenario generation");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.image.output_dir).await?;
    tokio::fs::create_dir_all(&config.speech.output_dir).await?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    // 生成门：状态记录落在数据库中，重启后仍可见
    let usage_repo = Arc::new(SqliteModelUsageRepository::new(pool.clone()));
    let gate = Arc::new(GenerationGate::new(usage_repo));

    // 语言模型服务
    let mut inference_config = HttpInferenceConfig::new(&config.inference.base_url)
        .with_timeout(config.inference.timeout_secs)
        .with_retry(config.inference.retry.policy())
        .with_structured_output(config.inference.structured_output);
    inference_config.api_key = config.inference.api_key.clone();
    inference_config.coercion_retries = config.inference.coercion_retries;
    inference_config.embedding_model = config.embedding.model.clone();
    let inference = Arc::new(HttpInferenceProvider::new(inference_config)?);

    // 图像渲染服务
    let mut image_config = SwarmClientConfig::new(&config.image.base_url, &config.image.ws_url)
        .with_output_dir(&config.image.output_dir)
        .with_session_wait(config.image.session_wait_secs);
    image_config.timeout_secs = config.image.timeout_secs;
    let images = Arc::new(SwarmImageClient::new(image_config).await?);

    // 语音合成服务
    let mut speech_config = HttpSpeechClientConfig::new(&config.speech.url)
        .with_timeout(config.speech.timeout_secs)
        .with_output_dir(&config.speech.output_dir);
    speech_config.model = config.speech.model.clone();
    speech_config.voice = config.speech.voice.clone();
    speech_config.response_format = config.speech.response_format.clone();
    speech_config.speed = config.speech.speed;
    let speech = Arc::new(HttpSpeechClient::new(speech_config)?);

    // 创建 Repository 适配器
    let profiles = Arc::new(SqliteProfileRepository::new(pool.clone()));
    let scenarios = Arc::new(SqliteScenarioRepository::new(pool.clone()));
    let messages = Arc::new(SqliteMessageRepository::new(pool.clone()));

    let ctx = StageContext {
        gate,
        inference,
        images,
        speech,
        profiles,
        scenarios,
        messages,
        presets: Arc::new(ImagePresets::from(&config.image.presets)),
        stage_retry: config.orchestrator.stage_retry.policy(),
    };

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let server = HttpServer::new(server_config, AppState::new(ctx));

    tracing::info!("Starting HTTP server...");

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
