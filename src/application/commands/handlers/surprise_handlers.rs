//! SurpriseMe Handler - 一键生成
//!
//! 依次驱动各阶段，每一步单独占用门；任一步忙碌则停止并返回 `Busy`。

use super::profile_handlers::{
    GenerateMainProfileImageHandler, GenerateProfileHandler,
    GenerateProfileImageDescriptionHandler, GenerateSampleProfileImagesHandler,
};
use super::scenario_handlers::GenerateScenarioHandler;
use super::context::StageContext;
use crate::application::commands::{
    GenerateMainProfileImage, GenerateProfile, GenerateProfileImageDescription,
    GenerateSampleProfileImages, GenerateScenario, SurpriseMe,
};
use crate::application::error::ApplicationError;
use crate::application::gate::StageOutcome;
use crate::application::ports::{ProfileRecord, ScenarioRecord};
use crate::domain::image::seed_from_image;

/// 一键生成结果
#[derive(Debug, Clone)]
pub struct SurpriseResult {
    pub profile: ProfileRecord,
    pub scenario: ScenarioRecord,
}

macro_rules! proceed {
    ($outcome:expr) => {
        match $outcome {
            StageOutcome::Completed(value) => value,
            StageOutcome::Busy { status } => return Ok(StageOutcome::Busy { status }),
        }
    };
}

/// SurpriseMe Handler
pub struct SurpriseMeHandler {
    ctx: StageContext,
    profile: GenerateProfileHandler,
    description: GenerateProfileImageDescriptionHandler,
    samples: GenerateSampleProfileImagesHandler,
    main_image: GenerateMainProfileImageHandler,
    scenario: GenerateScenarioHandler,
}

impl SurpriseMeHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            profile: GenerateProfileHandler::new(ctx.clone()),
            description: GenerateProfileImageDescriptionHandler::new(ctx.clone()),
            samples: GenerateSampleProfileImagesHandler::new(ctx.clone()),
            main_image: GenerateMainProfileImageHandler::new(ctx.clone()),
            scenario: GenerateScenarioHandler::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn handle(
        &self,
        command: SurpriseMe,
    ) -> Result<StageOutcome<SurpriseResult>, ApplicationError> {
        let profile = proceed!(
            self.profile
                .handle(GenerateProfile {
                    llm_model: command.llm_model.clone(),
                    special_requests: command.special_requests.clone(),
                })
                .await?
        );
        let profile_id = profile.id;
        tracing::info!(profile_id = %profile_id, "Surprise: profile ready");

        proceed!(
            self.description
                .handle(GenerateProfileImageDescription {
                    profile_id,
                    llm_model: command.llm_model.clone(),
                })
                .await?
        );

        let samples = proceed!(
            self.samples
                .handle(GenerateSampleProfileImages {
                    profile_id,
                    image_model: command.image_model.clone(),
                })
                .await?
        );

        let first = samples.first().ok_or_else(|| {
            ApplicationError::Protocol("no sample images were produced".to_string())
        })?;
        let seed = seed_from_image(first).ok_or_else(|| {
            ApplicationError::PreconditionSeedMissing(format!("no digits in image name '{}'", first))
        })?;
        tracing::info!(profile_id = %profile_id, seed, "Surprise: seed chosen");

        proceed!(
            self.main_image
                .handle(GenerateMainProfileImage {
                    profile_id,
                    image_model: command.image_model.clone(),
                    seed: Some(seed),
                    source_image: None,
                })
                .await?
        );

        let scenario = proceed!(
            self.scenario
                .handle(GenerateScenario {
                    profile_id,
                    llm_model: command.llm_model.clone(),
                    special_requests: command.special_requests.clone(),
                    chain_image_model: Some(command.image_model.clone()),
                })
                .await?
        );

        let profile = self.ctx.load_profile(profile_id).await?;
        tracing::info!(
            profile_id = %profile_id,
            scenario_id = %scenario.id,
            "Surprise: generation finished"
        );
        Ok(StageOutcome::Completed(SurpriseResult { profile, scenario }))
    }
}
