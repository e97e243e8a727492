//! Scenario Stage Handlers
//!
//! 情景 → 场景描述（逐个）→ 场景图像（逐张）。
//! 每次外部调用都是独立的门内单元，链式调用不会长时间占用门。

use chrono::Utc;
use serde::Deserialize;

use super::context::{require, StageContext};
use crate::application::commands::{
    GenerateScenario, GenerateScenarioImages, GenerateSceneDescriptions,
};
use crate::application::error::ApplicationError;
use crate::application::gate::StageOutcome;
use crate::application::ports::{generate_structured, generate_text, ScenarioRecord};
use crate::domain::prompts::{self, PersonaSheet};
use crate::domain::{remove_thinking, FieldKind, OutputSchema, StageKind, StructuredOutput};

/// 模型产出的情景
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDraft {
    pub title: String,
    pub summary: String,
    pub scene_summaries: Vec<String>,
    pub invitation: String,
}

impl StructuredOutput for ScenarioDraft {
    fn schema() -> OutputSchema {
        OutputSchema::new("scenario")
            .field("title", FieldKind::Text, "Short title")
            .field("summary", FieldKind::Text, "Two to three sentence summary")
            .field("scene_summaries", FieldKind::TextList, "Six to seven single sentence scenes")
            .field("invitation", FieldKind::Text, "Opening line spoken by the character")
    }
}

// ============================================================================
// GenerateScenario
// ============================================================================

/// GenerateScenario Handler
pub struct GenerateScenarioHandler {
    ctx: StageContext,
    descriptions: GenerateSceneDescriptionsHandler,
    images: GenerateScenarioImagesHandler,
}

impl GenerateScenarioHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            descriptions: GenerateSceneDescriptionsHandler::new(ctx.clone()),
            images: GenerateScenarioImagesHandler::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn handle(
        &self,
        command: GenerateScenario,
    ) -> Result<StageOutcome<ScenarioRecord>, ApplicationError> {
        let ctx = &self.ctx;
        let profile = ctx.load_profile(command.profile_id).await?;
        let persona = PersonaSheet {
            name: &profile.name,
            background: &profile.background,
            personality: &profile.personality,
            interests: &profile.interests,
            physical_characteristics: &profile.physical_characteristics,
        };
        let messages = prompts::scenario(&persona, &command.special_requests);

        let outcome = ctx
            .gate
            .run_stage(StageKind::Scenario, || async {
                let llm = ctx.llm(&command.llm_model).await?;
                let draft: ScenarioDraft = generate_structured(llm.as_ref(), &messages).await?;
                if draft.scene_summaries.is_empty() {
                    return Err(ApplicationError::MalformedStructuredOutput(
                        "scenario has no scene summaries".to_string(),
                    ));
                }

                let scenario = ScenarioRecord::new(
                    profile.id,
                    draft.title,
                    draft.summary,
                    draft.scene_summaries,
                    draft.invitation,
                );
                ctx.scenarios.save(&scenario).await?;

                tracing::info!(
                    scenario_id = %scenario.id,
                    profile_id = %profile.id,
                    title = %scenario.title,
                    scenes = scenario.scene_summaries.len(),
                    "Scenario generated"
                );
                Ok(scenario)
            })
            .await?;

        let scenario = match outcome {
            StageOutcome::Completed(scenario) => scenario,
            StageOutcome::Busy { status } => return Ok(StageOutcome::Busy { status }),
        };

        match &command.chain_image_model {
            Some(image_model) => self.chain(scenario, &command.llm_model, image_model).await,
            None => Ok(StageOutcome::Completed(scenario)),
        }
    }

    /// 场景描述 → 场景图像；中途遇到忙碌则停止并上报忙碌
    async fn chain(
        &self,
        scenario: ScenarioRecord,
        llm_model: &str,
        image_model: &str,
    ) -> Result<StageOutcome<ScenarioRecord>, ApplicationError> {
        let described = self
            .descriptions
            .handle(GenerateSceneDescriptions {
                scenario_id: scenario.id,
                llm_model: llm_model.to_string(),
            })
            .await?;
        if let StageOutcome::Busy { status } = described {
            tracing::warn!(scenario_id = %scenario.id, current = %status, "Scenario chain stopped during scene descriptions");
            return Ok(StageOutcome::Busy { status });
        }

        let illustrated = self
            .images
            .handle(GenerateScenarioImages {
                scenario_id: scenario.id,
                image_model: image_model.to_string(),
            })
            .await?;
        if let StageOutcome::Busy { status } = &illustrated {
            tracing::warn!(scenario_id = %scenario.id, current = %status, "Scenario chain stopped during scenario images");
        }
        Ok(illustrated)
    }
}

// ============================================================================
// GenerateSceneDescriptions
// ============================================================================

/// GenerateSceneDescriptions Handler
///
/// 顺序生成，每个描述都参考上一个以保持服装、场景连贯。
pub struct GenerateSceneDescriptionsHandler {
    ctx: StageContext,
}

impl GenerateSceneDescriptionsHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: GenerateSceneDescriptions,
    ) -> Result<StageOutcome<ScenarioRecord>, ApplicationError> {
        let ctx = &self.ctx;
        let scenario = ctx.load_scenario(command.scenario_id).await?;
        if scenario.scene_summaries.is_empty() {
            return Err(ApplicationError::precondition(
                "cannot generate scene descriptions: scene_summaries is empty",
            ));
        }
        let profile = ctx.load_profile(scenario.profile_id).await?;
        require(
            &profile.physical_characteristics,
            "cannot generate scene descriptions: physical_characteristics is empty",
        )?;

        let mut descriptions: Vec<String> = Vec::with_capacity(scenario.scene_summaries.len());

        for (index, summary) in scenario.scene_summaries.iter().enumerate() {
            let previous = descriptions.last().map(String::as_str).unwrap_or_default();
            let messages = prompts::scene_description(
                &profile.physical_characteristics,
                &scenario.summary,
                summary,
                previous,
            );
            let done = &descriptions;

            // 每个描述完成即落库；首个单元替换旧列表
            let outcome = ctx
                .gate
                .run_stage(StageKind::SceneDescription, || async {
                    let llm = ctx.llm(&command.llm_model).await?;
                    let description =
                        remove_thinking(&generate_text(llm.as_ref(), &messages).await?);
                    if description.is_empty() {
                        return Err(ApplicationError::ExternalServiceError(format!(
                            "model returned no description for scene {}",
                            index
                        )));
                    }

                    let mut current = ctx.load_scenario(command.scenario_id).await?;
                    current.scene_descriptions = done.clone();
                    current.scene_descriptions.push(description.clone());
                    current.updated_at = Utc::now();
                    ctx.scenarios.save(&current).await?;
                    Ok(description)
                })
                .await?;

            match outcome {
                StageOutcome::Completed(description) => {
                    tracing::debug!(scenario_id = %scenario.id, scene = index, "Scene description generated");
                    descriptions.push(description);
                }
                StageOutcome::Busy { status } => {
                    tracing::warn!(
                        scenario_id = %scenario.id,
                        saved = descriptions.len(),
                        current = %status,
                        "Scene descriptions interrupted"
                    );
                    return Ok(StageOutcome::Busy { status });
                }
            }
        }

        tracing::info!(
            scenario_id = %scenario.id,
            count = descriptions.len(),
            "Scene descriptions generated"
        );
        Ok(StageOutcome::Completed(
            ctx.load_scenario(command.scenario_id).await?,
        ))
    }
}

// ============================================================================
// GenerateScenarioImages
// ============================================================================

/// GenerateScenarioImages Handler
///
/// 每张图都用角色主头像的种子；单张失败跳过，路径随生成逐个保存。
/// 本批首张成功的图像替换旧列表，之后追加。
pub struct GenerateScenarioImagesHandler {
    ctx: StageContext,
}

impl GenerateScenarioImagesHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: GenerateScenarioImages,
    ) -> Result<StageOutcome<ScenarioRecord>, ApplicationError> {
        let ctx = &self.ctx;
        let scenario = ctx.load_scenario(command.scenario_id).await?;
        if scenario.scene_descriptions.is_empty() {
            return Err(ApplicationError::precondition(
                "cannot generate images: scene_descriptions is empty",
            ));
        }
        let profile = ctx.load_profile(scenario.profile_id).await?;
        let seed = profile.image_seed.ok_or_else(|| {
            ApplicationError::PreconditionSeedMissing(format!(
                "profile {} has no main image seed",
                profile.id
            ))
        })?;

        let descriptions = scenario.scene_descriptions;
        let mut produced = 0usize;

        for (index, description) in descriptions.iter().enumerate() {
            let request = ctx
                .presets
                .target_request(&command.image_model, description, seed);
            let first_batch = produced == 0;
            let last = index + 1 == descriptions.len();

            let outcome = ctx
                .gate
                .run_stage(StageKind::ScenarioImage, || async {
                    let paths = match ctx.render(&request).await {
                        Ok(paths) => paths,
                        // 整批无一成功时由最后一个单元上报失败
                        Err(e) if last && first_batch => {
                            return Err(ApplicationError::Protocol(format!(
                                "no images generated for scenario {}: {}",
                                command.scenario_id, e
                            )));
                        }
                        Err(e) => {
                            tracing::warn!(
                                scenario_id = %command.scenario_id,
                                scene = index,
                                error = %e,
                                "Scene image failed, skipping"
                            );
                            return Ok(0);
                        }
                    };

                    let mut current = ctx.load_scenario(command.scenario_id).await?;
                    if first_batch {
                        current.images = paths.clone();
                    } else {
                        current.images.extend(paths.iter().cloned());
                    }
                    current.updated_at = Utc::now();
                    ctx.scenarios.save(&current).await?;
                    Ok(paths.len())
                })
                .await?;

            match outcome {
                StageOutcome::Completed(count) => produced += count,
                StageOutcome::Busy { status } => return Ok(StageOutcome::Busy { status }),
            }
        }

        tracing::info!(scenario_id = %command.scenario_id, count = produced, "Scenario images generated");
        Ok(StageOutcome::Completed(
            ctx.load_scenario(command.scenario_id).await?,
        ))
    }
}
