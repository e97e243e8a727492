//! Profile Stage Handlers
//!
//! 角色设定 → 头像描述 → 低保真样图 → 主头像

use chrono::Utc;
use serde::Deserialize;

use super::context::{require, StageContext};
use crate::application::commands::{
    GenerateMainProfileImage, GenerateProfile, GenerateProfileImageDescription,
    GenerateSampleProfileImages,
};
use crate::application::error::ApplicationError;
use crate::application::gate::StageOutcome;
use crate::application::ports::{generate_structured, generate_text, ProfileRecord};
use crate::domain::image::seed_from_image;
use crate::domain::{prompts, remove_thinking, FieldKind, OutputSchema, StageKind, StructuredOutput};

/// 模型产出的角色设定
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDraft {
    pub name: String,
    pub background: String,
    pub personality: String,
    pub interests: String,
    pub physical_characteristics: String,
}

impl StructuredOutput for ProfileDraft {
    fn schema() -> OutputSchema {
        OutputSchema::new("profile")
            .field("name", FieldKind::Text, "Character name inferred from the birthplace")
            .field("background", FieldKind::Text, "Origin, education, occupation and formative events")
            .field("personality", FieldKind::Text, "Temperament, desires and quirks")
            .field("interests", FieldKind::Text, "Short list of interests")
            .field(
                "physical_characteristics",
                FieldKind::Text,
                "Comma separated appearance fragments for an image generator",
            )
    }
}

// ============================================================================
// GenerateProfile
// ============================================================================

/// GenerateProfile Handler
pub struct GenerateProfileHandler {
    ctx: StageContext,
}

impl GenerateProfileHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: GenerateProfile,
    ) -> Result<StageOutcome<ProfileRecord>, ApplicationError> {
        let ctx = &self.ctx;
        let messages = prompts::profile(&command.special_requests);

        ctx.gate
            .run_stage(StageKind::Profile, || async {
                let llm = ctx.llm(&command.llm_model).await?;
                let draft: ProfileDraft = generate_structured(llm.as_ref(), &messages).await?;

                let profile = ProfileRecord::new(
                    draft.name,
                    draft.background,
                    draft.personality,
                    draft.interests,
                    draft.physical_characteristics,
                );
                ctx.profiles.save(&profile).await?;

                tracing::info!(
                    profile_id = %profile.id,
                    name = %profile.name,
                    model = %command.llm_model,
                    "Profile generated"
                );
                Ok(profile)
            })
            .await
    }
}

// ============================================================================
// GenerateProfileImageDescription
// ============================================================================

/// GenerateProfileImageDescription Handler
pub struct GenerateProfileImageDescriptionHandler {
    ctx: StageContext,
}

impl GenerateProfileImageDescriptionHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: GenerateProfileImageDescription,
    ) -> Result<StageOutcome<String>, ApplicationError> {
        let ctx = &self.ctx;
        let profile = ctx.load_profile(command.profile_id).await?;
        require(
            &profile.physical_characteristics,
            "cannot describe profile image: physical_characteristics is empty",
        )?;
        let messages = prompts::profile_image_description(&profile.physical_characteristics);

        ctx.gate
            .run_stage(StageKind::ProfileImageDescription, || async {
                let llm = ctx.llm(&command.llm_model).await?;
                let description = remove_thinking(&generate_text(llm.as_ref(), &messages).await?);
                if description.is_empty() {
                    return Err(ApplicationError::ExternalServiceError(
                        "model returned no profile image description".to_string(),
                    ));
                }

                // 门内重新读取，避免覆盖其他阶段的写入
                let mut profile = ctx.load_profile(command.profile_id).await?;
                profile.image_description = description.clone();
                profile.updated_at = Utc::now();
                ctx.profiles.save(&profile).await?;

                tracing::info!(profile_id = %profile.id, "Profile image description generated");
                Ok(description)
            })
            .await
    }
}

// ============================================================================
// GenerateSampleProfileImages
// ============================================================================

/// GenerateSampleProfileImages Handler
///
/// 低保真、随机种子；结果追加到头像列表。
pub struct GenerateSampleProfileImagesHandler {
    ctx: StageContext,
}

impl GenerateSampleProfileImagesHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: GenerateSampleProfileImages,
    ) -> Result<StageOutcome<Vec<String>>, ApplicationError> {
        let ctx = &self.ctx;
        let profile = ctx.load_profile(command.profile_id).await?;
        require(
            &profile.image_description,
            "cannot generate images: profile image description is empty",
        )?;
        let request = ctx
            .presets
            .seed_search_request(&command.image_model, &profile.image_description);

        ctx.gate
            .run_stage(StageKind::SampleProfileImages, || async {
                let paths = ctx.render(&request).await?;

                let mut profile = ctx.load_profile(command.profile_id).await?;
                profile.image_paths.extend(paths.iter().cloned());
                profile.updated_at = Utc::now();
                ctx.profiles.save(&profile).await?;

                tracing::info!(
                    profile_id = %profile.id,
                    count = paths.len(),
                    "Sample profile images generated"
                );
                Ok(paths)
            })
            .await
    }
}

// ============================================================================
// GenerateMainProfileImage
// ============================================================================

/// GenerateMainProfileImage Handler
///
/// 高保真、固定种子；删除旧图后替换头像列表，并记录种子。
pub struct GenerateMainProfileImageHandler {
    ctx: StageContext,
}

impl GenerateMainProfileImageHandler {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        command: GenerateMainProfileImage,
    ) -> Result<StageOutcome<ProfileRecord>, ApplicationError> {
        let ctx = &self.ctx;
        let profile = ctx.load_profile(command.profile_id).await?;
        require(
            &profile.image_description,
            "cannot generate image: profile image description is empty",
        )?;
        let seed = resolve_seed(&command, &profile)?;
        let request = ctx
            .presets
            .target_request(&command.image_model, &profile.image_description, seed);

        ctx.gate
            .run_stage(StageKind::MainProfileImage, || async {
                let paths = ctx.render(&request).await?;

                let mut profile = ctx.load_profile(command.profile_id).await?;
                let previous = std::mem::replace(&mut profile.image_paths, paths);
                let stale: Vec<String> = previous
                    .into_iter()
                    .filter(|p| !profile.image_paths.contains(p))
                    .collect();
                ctx.images.discard(&stale).await;

                profile.image_seed = Some(seed);
                profile.updated_at = Utc::now();
                ctx.profiles.save(&profile).await?;

                tracing::info!(
                    profile_id = %profile.id,
                    seed,
                    removed = stale.len(),
                    "Main profile image generated"
                );
                Ok(profile)
            })
            .await
    }
}

fn resolve_seed(
    command: &GenerateMainProfileImage,
    profile: &ProfileRecord,
) -> Result<i64, ApplicationError> {
    if let Some(seed) = command.seed {
        return Ok(seed);
    }
    if let Some(source) = &command.source_image {
        return seed_from_image(source).ok_or_else(|| {
            ApplicationError::PreconditionSeedMissing(format!("no digits in image name '{}'", source))
        });
    }
    profile.image_seed.ok_or_else(|| {
        ApplicationError::PreconditionSeedMissing(format!("profile {} has no image seed", profile.id))
    })
}
