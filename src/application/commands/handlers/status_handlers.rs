//! Status Command Handlers

use std::sync::Arc;

use crate::application::commands::{ForceIdle, SetModels};
use crate::application::error::ApplicationError;
use crate::application::gate::GenerationGate;
use crate::domain::GenerationStatus;

// ============================================================================
// SetModels
// ============================================================================

/// SetModels Handler
pub struct SetModelsHandler {
    gate: Arc<GenerationGate>,
}

impl SetModelsHandler {
    pub fn new(gate: Arc<GenerationGate>) -> Self {
        Self { gate }
    }

    pub async fn handle(&self, command: SetModels) -> Result<GenerationStatus, ApplicationError> {
        if command.llm_model.trim().is_empty() || command.image_model.trim().is_empty() {
            return Err(ApplicationError::validation(
                "llm_model and image_model are required",
            ));
        }

        let status = self
            .gate
            .set_models(
                command.llm_model.trim(),
                command.image_model.trim(),
                command.tts_model.as_deref().map(str::trim).filter(|m| !m.is_empty()),
            )
            .await?;

        tracing::info!(
            llm_model = %status.llm_model,
            image_model = %status.image_model,
            tts_model = ?status.tts_model,
            "Models selected"
        );
        Ok(status)
    }
}

// ============================================================================
// ForceIdle
// ============================================================================

/// ForceIdle Handler，返回之前的状态
pub struct ForceIdleHandler {
    gate: Arc<GenerationGate>,
}

impl ForceIdleHandler {
    pub fn new(gate: Arc<GenerationGate>) -> Self {
        Self { gate }
    }

    pub async fn handle(&self, _command: ForceIdle) -> Result<String, ApplicationError> {
        self.gate.force_idle().await
    }
}
