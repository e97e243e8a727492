//! Status Query Handlers - 生成状态与模型列表

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::gate::GenerationGate;
use crate::application::ports::{ImageEnginePort, InferenceProviderPort};
use crate::application::queries::{GetStatus, ListImageModels, ListLlmModels};
use crate::domain::GenerationStatus;

/// GetStatus Handler
pub struct GetStatusHandler {
    gate: Arc<GenerationGate>,
}

impl GetStatusHandler {
    pub fn new(gate: Arc<GenerationGate>) -> Self {
        Self { gate }
    }

    pub async fn handle(&self, _query: GetStatus) -> Result<GenerationStatus, ApplicationError> {
        self.gate.status().await
    }
}

/// ListLlmModels Handler
pub struct ListLlmModelsHandler {
    inference: Arc<dyn InferenceProviderPort>,
}

impl ListLlmModelsHandler {
    pub fn new(inference: Arc<dyn InferenceProviderPort>) -> Self {
        Self { inference }
    }

    pub async fn handle(&self, _query: ListLlmModels) -> Result<Vec<String>, ApplicationError> {
        let models = self.inference.list_models().await?;
        tracing::debug!(count = models.len(), "Language models listed");
        Ok(models)
    }
}

/// ListImageModels Handler
pub struct ListImageModelsHandler {
    images: Arc<dyn ImageEnginePort>,
}

impl ListImageModelsHandler {
    pub fn new(images: Arc<dyn ImageEnginePort>) -> Self {
        Self { images }
    }

    pub async fn handle(&self, _query: ListImageModels) -> Result<Vec<String>, ApplicationError> {
        let models = self.images.list_models().await?;
        tracing::debug!(count = models.len(), "Image models listed");
        Ok(models)
    }
}
