//! 集成测试共用的假引擎与装配

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storyforge::application::ports::{
    ImageEnginePort, ImageError, InferenceEnginePort, InferenceError, InferenceOutput,
    InferenceProviderPort, ModelUsageRepositoryPort, ProfileRecord, ProfileRepositoryPort,
    RepositoryError, SpeechEnginePort, SpeechError, SpeechRequest, SpeechResponse,
};
use storyforge::application::{GenerationGate, RetryPolicy, StageContext};
use storyforge::domain::image::{ImageGenerationRequest, ImagePresets, RANDOM_SEED};
use storyforge::domain::{ChatMessage, GenerationStatus, OutputSchema, IDLE};
use storyforge::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteMessageRepository,
    SqliteModelUsageRepository, SqliteProfileRepository, SqliteScenarioRepository,
};
use storyforge::infrastructure::InMemoryModelUsageStore;

/// 首张样图的种子
pub const FIRST_SAMPLE_SEED: i64 = 4242;

// ============================================================================
// 语言模型
// ============================================================================

/// 按 schema 名称返回固定的角色设定 / 情景；无 schema 时返回带推理旁路的文本
pub struct FakeLlm {
    pub calls: AtomicUsize,
    pub filtered: AtomicBool,
    pub delay: Duration,
    pub scenes: usize,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            filtered: AtomicBool::new(false),
            delay: Duration::ZERO,
            scenes: 2,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn structured(&self, schema: &OutputSchema) -> Result<Map<String, Value>, InferenceError> {
        let value = match schema.name {
            "profile" => json!({
                "name": "Mira Kestrel",
                "background": "Raised in a lighthouse on the northern coast",
                "personality": "Curious and stubborn",
                "interests": "sailing, star charts",
                "physical_characteristics": "auburn braid, freckles, green eyes, oilskin coat",
            }),
            "scenario" => json!({
                "title": "The Lantern Regatta",
                "summary": "A night race between harbour towns.",
                "scene_summaries": (0..self.scenes)
                    .map(|i| format!("Scene {} of the race", i))
                    .collect::<Vec<_>>(),
                "invitation": "Will you crew for me tonight?",
            }),
            other => {
                return Err(InferenceError::InvalidResponse(format!(
                    "unexpected schema {}",
                    other
                )))
            }
        };

        match value {
            Value::Object(map) => Ok(map),
            _ => Err(InferenceError::InvalidResponse("not an object".to_string())),
        }
    }
}

#[async_trait]
impl InferenceEnginePort for FakeLlm {
    fn model_name(&self) -> &str {
        "fake-llm"
    }

    fn supports_native_schema(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        _messages: &[ChatMessage],
        schema: Option<&OutputSchema>,
    ) -> Result<InferenceOutput, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.filtered.load(Ordering::SeqCst) {
            return Err(InferenceError::ContentFiltered);
        }

        match schema {
            Some(schema) => Ok(InferenceOutput::Structured(self.structured(schema)?)),
            None => Ok(InferenceOutput::Text(format!(
                "<think>planning reply {}</think>Text number {}",
                call, call
            ))),
        }
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, InferenceError> {
        Ok(inputs.iter().map(|t| vec![t.len() as f32]).collect())
    }
}

pub struct FakeProvider {
    pub llm: Arc<FakeLlm>,
}

#[async_trait]
impl InferenceProviderPort for FakeProvider {
    async fn client(&self, _model: &str) -> Result<Arc<dyn InferenceEnginePort>, InferenceError> {
        Ok(self.llm.clone())
    }

    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        Ok(vec!["fake-llm".to_string()])
    }
}

// ============================================================================
// 图像
// ============================================================================

/// 记录所有请求；随机种子时按 4242、4243… 命名，固定种子时文件名以该种子开头
pub struct FakeImages {
    pub requests: Mutex<Vec<ImageGenerationRequest>>,
    pub discarded: Mutex<Vec<String>>,
    /// 这些调用序号（从 0 开始）返回协议错误
    pub failing_calls: Mutex<HashSet<usize>>,
}

impl FakeImages {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            discarded: Mutex::new(Vec::new()),
            failing_calls: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_call(&self, index: usize) {
        self.failing_calls.lock().unwrap().insert(index);
    }

    pub fn requests(&self) -> Vec<ImageGenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageEnginePort for FakeImages {
    async fn generate(&self, request: &ImageGenerationRequest) -> Result<Vec<String>, ImageError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };

        if self.failing_calls.lock().unwrap().contains(&call) {
            return Err(ImageError::Protocol("channel closed".to_string()));
        }

        let paths = (0..request.images as i64)
            .map(|i| {
                if request.seed == RANDOM_SEED {
                    format!("out/{}-{}.png", FIRST_SAMPLE_SEED + i, call)
                } else {
                    format!("out/{}-{}-{}.png", request.seed, call, i)
                }
            })
            .collect();
        Ok(paths)
    }

    async fn list_models(&self) -> Result<Vec<String>, ImageError> {
        Ok(vec!["sdxl".to_string()])
    }

    async fn discard(&self, paths: &[String]) {
        self.discarded.lock().unwrap().extend(paths.iter().cloned());
    }
}

// ============================================================================
// 语音
// ============================================================================

pub struct FakeSpeech {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeechEnginePort for FakeSpeech {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SpeechResponse {
            audio_path: PathBuf::from("out/1700000000000.wav"),
            size_bytes: request.text.len(),
        })
    }
}

// ============================================================================
// 竞争与延迟
// ============================================================================

/// 第 `steal_at` 次释放为 idle 时，另一个阶段立即抢占生成门
pub struct CompetingUsageStore {
    inner: InMemoryModelUsageStore,
    releases: AtomicUsize,
    steal_at: usize,
    competitor: String,
}

impl CompetingUsageStore {
    pub fn new(steal_at: usize, competitor: &str) -> Self {
        Self {
            inner: InMemoryModelUsageStore::new(),
            releases: AtomicUsize::new(0),
            steal_at,
            competitor: competitor.to_string(),
        }
    }
}

#[async_trait]
impl ModelUsageRepositoryPort for CompetingUsageStore {
    async fn get(&self) -> Result<GenerationStatus, RepositoryError> {
        self.inner.get().await
    }

    async fn save_models(
        &self,
        llm_model: &str,
        image_model: &str,
        tts_model: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.inner.save_models(llm_model, image_model, tts_model).await
    }

    async fn compare_and_set_status(
        &self,
        expected: &str,
        new_status: &str,
    ) -> Result<bool, RepositoryError> {
        self.inner.compare_and_set_status(expected, new_status).await
    }

    async fn set_status(&self, status: &str) -> Result<String, RepositoryError> {
        if status == IDLE && self.releases.fetch_add(1, Ordering::SeqCst) + 1 == self.steal_at {
            return self.inner.set_status(&self.competitor).await;
        }
        self.inner.set_status(status).await
    }
}

/// 第一次按 id 读取时延迟，其余调用直接转发
pub struct SlowFirstLookup {
    inner: Arc<dyn ProfileRepositoryPort>,
    delay: Duration,
    lookups: AtomicUsize,
}

impl SlowFirstLookup {
    pub fn new(inner: Arc<dyn ProfileRepositoryPort>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProfileRepositoryPort for SlowFirstLookup {
    async fn save(&self, profile: &ProfileRecord) -> Result<(), RepositoryError> {
        self.inner.save(profile).await
    }

    async fn find_by_id(&self, id: uuid::Uuid) -> Result<Option<ProfileRecord>, RepositoryError> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<ProfileRecord>, RepositoryError> {
        self.inner.find_all().await
    }
}

// ============================================================================
// 装配
// ============================================================================

pub struct Harness {
    pub ctx: StageContext,
    pub llm: Arc<FakeLlm>,
    pub images: Arc<FakeImages>,
    pub speech: Arc<FakeSpeech>,
}

/// 生成状态存放位置
pub enum UsageStore {
    Memory,
    Sqlite,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(FakeLlm::new(), UsageStore::Memory).await
    }

    pub async fn build(llm: FakeLlm, store: UsageStore) -> Self {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let gate = match store {
            UsageStore::Memory => GenerationGate::new(Arc::new(InMemoryModelUsageStore::new())),
            UsageStore::Sqlite => {
                GenerationGate::new(Arc::new(SqliteModelUsageRepository::new(pool.clone())))
            }
        };

        let llm = Arc::new(llm);
        let images = Arc::new(FakeImages::new());
        let speech = Arc::new(FakeSpeech {
            calls: AtomicUsize::new(0),
        });

        let ctx = StageContext {
            gate: Arc::new(gate),
            inference: Arc::new(FakeProvider { llm: llm.clone() }),
            images: images.clone(),
            speech: speech.clone(),
            profiles: Arc::new(SqliteProfileRepository::new(pool.clone())),
            scenarios: Arc::new(SqliteScenarioRepository::new(pool.clone())),
            messages: Arc::new(SqliteMessageRepository::new(pool)),
            presets: Arc::new(ImagePresets::default()),
            stage_retry: RetryPolicy::none(),
        };

        Self {
            ctx,
            llm,
            images,
            speech,
        }
    }

    /// 换成会被竞争阶段抢占的生成门
    pub fn with_competitor(mut self, steal_at: usize, competitor: &str) -> Self {
        self.ctx.gate = Arc::new(GenerationGate::new(Arc::new(CompetingUsageStore::new(
            steal_at, competitor,
        ))));
        self
    }

    pub async fn status(&self) -> String {
        self.ctx.gate.status().await.unwrap().status
    }
}
