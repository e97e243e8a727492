//! 生成阶段共享的依赖

use std::sync::Arc;
use uuid::Uuid;

use crate::application::error::ApplicationError;
use crate::application::gate::GenerationGate;
use crate::application::ports::{
    ImageEnginePort, InferenceEnginePort, InferenceProviderPort, MessageRepositoryPort,
    ProfileRecord, ProfileRepositoryPort, ScenarioRecord, ScenarioRepositoryPort,
    SpeechEnginePort,
};
use crate::application::retry::{retry_with_fixed_delay, RetryPolicy};
use crate::domain::image::{ImageGenerationRequest, ImagePresets};

/// 阶段上下文
///
/// 所有生成阶段 Handler 持有同一份（字段均为 Arc，克隆开销很小）。
#[derive(Clone)]
pub struct StageContext {
    pub gate: Arc<GenerationGate>,
    pub inference: Arc<dyn InferenceProviderPort>,
    pub images: Arc<dyn ImageEnginePort>,
    pub speech: Arc<dyn SpeechEnginePort>,
    pub profiles: Arc<dyn ProfileRepositoryPort>,
    pub scenarios: Arc<dyn ScenarioRepositoryPort>,
    pub messages: Arc<dyn MessageRepositoryPort>,
    pub presets: Arc<ImagePresets>,
    /// 阶段级重试，只包裹门内的外部调用
    pub stage_retry: RetryPolicy,
}

impl StageContext {
    pub async fn load_profile(&self, id: Uuid) -> Result<ProfileRecord, ApplicationError> {
        self.profiles
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Profile", id))
    }

    pub async fn load_scenario(&self, id: Uuid) -> Result<ScenarioRecord, ApplicationError> {
        self.scenarios
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Scenario", id))
    }

    pub async fn llm(&self, model: &str) -> Result<Arc<dyn InferenceEnginePort>, ApplicationError> {
        Ok(self.inference.client(model).await?)
    }

    /// 生成图像（带阶段级重试），空结果视为协议失败
    pub async fn render(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<Vec<String>, ApplicationError> {
        retry_with_fixed_delay(
            &self.stage_retry,
            "image generation",
            ApplicationError::is_stage_retryable,
            move || async move {
                let paths = self.images.generate(request).await?;
                if paths.is_empty() {
                    return Err(ApplicationError::Protocol(
                        "image channel closed before any image was produced".to_string(),
                    ));
                }
                Ok(paths)
            },
        )
        .await
    }
}

/// 必填字段检查
pub(crate) fn require(value: &str, message: &str) -> Result<(), ApplicationError> {
    if value.trim().is_empty() {
        Err(ApplicationError::precondition(message))
    } else {
        Ok(())
    }
}
