//! 图像生成领域模型
//!
//! - `ImageGenerationRequest` 及两种预设（找种子 / 目标还原）
//! - 双工通道帧解码为 `ImageGenerationEvent`
//! - `BatchProgress`：按进度事件判定一次生成何时完成
//! - `seed_from_image`：从文件名恢复种子

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// 随机种子
pub const RANDOM_SEED: i64 = -1;

/// 两种预设都附带的反向提示词
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "watermark, text, signature, logo, blurry, deformed, extra limbs, extra fingers, cropped";

// ============================================================================
// 请求与预设
// ============================================================================

/// 预设参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetParams {
    /// 一次生成的图像数量
    pub images: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub sampler: String,
    pub scheduler: String,
}

impl PresetParams {
    /// 低保真：步数少、引导弱，用于廉价地试出几种外观
    pub fn seed_search() -> Self {
        Self {
            images: 3,
            steps: 4,
            cfg_scale: 2.0,
            width: 1024,
            height: 1024,
            sampler: "euler".to_string(),
            scheduler: "normal".to_string(),
        }
    }

    /// 高保真：用已知种子忠实还原
    pub fn target() -> Self {
        Self {
            images: 1,
            steps: 30,
            cfg_scale: 7.0,
            width: 1024,
            height: 1024,
            sampler: "dpmpp_2m".to_string(),
            scheduler: "karras".to_string(),
        }
    }
}

/// 图像生成请求（字段名与渲染服务的线上格式一致）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(rename = "negativeprompt")]
    pub negative_prompt: String,
    pub images: u32,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    #[serde(rename = "cfgscale")]
    pub cfg_scale: f64,
    pub sampler: String,
    pub scheduler: String,
    pub seed: i64,
}

impl ImageGenerationRequest {
    pub fn from_preset(
        params: &PresetParams,
        model: impl Into<String>,
        prompt: impl Into<String>,
        negative_prompt: impl Into<String>,
        seed: i64,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
            images: params.images.max(1),
            width: params.width,
            height: params.height,
            steps: params.steps,
            cfg_scale: params.cfg_scale,
            sampler: params.sampler.clone(),
            scheduler: params.scheduler.clone(),
            seed,
        }
    }
}

/// 预设集合
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePresets {
    pub seed_search: PresetParams,
    pub target: PresetParams,
    pub negative_prompt: String,
}

impl Default for ImagePresets {
    fn default() -> Self {
        Self {
            seed_search: PresetParams::seed_search(),
            target: PresetParams::target(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        }
    }
}

impl ImagePresets {
    /// 找种子请求：随机种子
    pub fn seed_search_request(&self, model: &str, prompt: &str) -> ImageGenerationRequest {
        ImageGenerationRequest::from_preset(
            &self.seed_search,
            model,
            prompt,
            self.negative_prompt.as_str(),
            RANDOM_SEED,
        )
    }

    /// 目标请求：固定种子
    pub fn target_request(&self, model: &str, prompt: &str, seed: i64) -> ImageGenerationRequest {
        ImageGenerationRequest::from_preset(
            &self.target,
            model,
            prompt,
            self.negative_prompt.as_str(),
            seed,
        )
    }
}

// ============================================================================
// 种子与路径
// ============================================================================

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("digits regex"))
}

/// 取文件名中第一段十进制数字作为种子
pub fn seed_from_image(path: &str) -> Option<i64> {
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);

    digits_re()
        .find(file_name)
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// 将渲染服务返回的图像引用解析为绝对地址
pub fn resolve_image_url(base_url: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        reference.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            reference.trim_start_matches('/')
        )
    }
}

// ============================================================================
// 双工通道事件
// ============================================================================

/// 生成通道上的事件
#[derive(Debug, Clone, PartialEq)]
pub enum ImageGenerationEvent {
    Status(String),
    Progress {
        batch_index: u32,
        overall_percent: f64,
        current_percent: f64,
    },
    Image {
        path: String,
    },
}

/// 帧解码错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("undecodable frame: {0}")]
    Undecodable(String),

    /// 服务端在通道上报告的错误
    #[error("remote error: {0}")]
    Remote(String),
}

#[derive(Debug, Deserialize)]
struct FrameEnvelope {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    gen_progress: Option<ProgressFrame>,
    #[serde(default)]
    image: Option<ImageFrame>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgressFrame {
    batch_index: BatchIndex,
    #[serde(default)]
    overall_percent: f64,
    #[serde(default)]
    current_percent: f64,
}

/// 批次序号有时是数字，有时是字符串
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchIndex {
    Number(u32),
    Text(String),
}

impl BatchIndex {
    fn value(&self) -> Option<u32> {
        match self {
            BatchIndex::Number(n) => Some(*n),
            BatchIndex::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// 图像引用有时是字符串，有时是 `{"image": "..."}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageFrame {
    Path(String),
    Detailed { image: String },
}

impl ImageFrame {
    fn into_path(self) -> String {
        match self {
            ImageFrame::Path(p) => p,
            ImageFrame::Detailed { image } => image,
        }
    }
}

/// 解码一帧，按 status → progress → image 顺序返回其中携带的事件
pub fn decode_frame(text: &str) -> Result<Vec<ImageGenerationEvent>, FrameError> {
    if text.trim().is_empty() {
        return Err(FrameError::Empty);
    }

    let envelope: FrameEnvelope =
        serde_json::from_str(text).map_err(|e| FrameError::Undecodable(e.to_string()))?;

    if let Some(error) = envelope.error {
        return Err(FrameError::Remote(error));
    }

    let mut events = Vec::new();

    if let Some(status) = envelope.status {
        let text = match status {
            Value::String(s) => s,
            other => other.to_string(),
        };
        events.push(ImageGenerationEvent::Status(text));
    }

    if let Some(progress) = envelope.gen_progress {
        let batch_index = progress
            .batch_index
            .value()
            .ok_or_else(|| FrameError::Undecodable("invalid batch_index".to_string()))?;
        events.push(ImageGenerationEvent::Progress {
            batch_index,
            overall_percent: progress.overall_percent,
            current_percent: progress.current_percent,
        });
    }

    if let Some(image) = envelope.image {
        events.push(ImageGenerationEvent::Image {
            path: image.into_path(),
        });
    }

    Ok(events)
}

// ============================================================================
// 协议状态与完成判定
// ============================================================================

/// 一次图像生成调用的协议状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    NoSession,
    SessionRequested,
    SessionActive,
    ModelSelecting,
    ModelSelected,
    Generating,
    Complete,
    Failed,
}

impl ProtocolState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolState::Complete | ProtocolState::Failed)
    }
}

/// 生成阶段的进度跟踪
///
/// 最后一个批次报告 `overall_percent == 1.0` 后置位"可结束"，
/// 之后到达的下一张图像结束读取循环。
#[derive(Debug, Clone)]
pub struct BatchProgress {
    requested_images: u32,
    images: Vec<String>,
    ready_to_finish: bool,
    latest: Option<(u32, f64, f64)>,
    complete: bool,
}

impl BatchProgress {
    pub fn new(requested_images: u32) -> Self {
        Self {
            requested_images: requested_images.max(1),
            images: Vec::new(),
            ready_to_finish: false,
            latest: None,
            complete: false,
        }
    }

    /// 应用一个事件，返回是否已完成
    pub fn apply(&mut self, event: ImageGenerationEvent) -> bool {
        if self.complete {
            return true;
        }

        match event {
            ImageGenerationEvent::Status(_) => {}
            ImageGenerationEvent::Progress {
                batch_index,
                overall_percent,
                current_percent,
            } => {
                self.latest = Some((batch_index, overall_percent, current_percent));
                if batch_index == self.requested_images - 1 && overall_percent >= 1.0 {
                    self.ready_to_finish = true;
                }
            }
            ImageGenerationEvent::Image { path } => {
                self.images.push(path);
                if self.ready_to_finish {
                    self.complete = true;
                }
            }
        }

        self.complete
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// 最近一次进度 (batch_index, overall, current)
    pub fn latest_progress(&self) -> Option<(u32, f64, f64)> {
        self.latest
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn into_images(self) -> Vec<String> {
        self.images
    }
}
