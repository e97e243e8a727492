//! Application State
//!
//! 持有所有 Command/Query Handler、生成门与后台执行槽

use std::sync::Arc;

use crate::application::{
    // Command handlers
    ForceIdleHandler, GenerateMainProfileImageHandler, GenerateProfileHandler,
    GenerateProfileImageDescriptionHandler, GenerateSampleProfileImagesHandler,
    GenerateScenarioHandler, GenerateScenarioImagesHandler, GenerateSceneDescriptionsHandler,
    GenerateSpeechHandler, RespondToChatHandler, SetModelsHandler, StageContext,
    SurpriseMeHandler,
    // Query handlers
    GetMessagesHandler, GetProfileHandler, GetScenarioHandler, GetStatusHandler,
    ListImageModelsHandler, ListLlmModelsHandler, ListProfilesHandler, ListScenariosHandler,
    GenerationGate,
};
use crate::infrastructure::worker::StageExecutor;

/// 应用状态
pub struct AppState {
    pub gate: Arc<GenerationGate>,
    pub executor: StageExecutor,

    // ========== Command Handlers ==========
    pub generate_profile_handler: GenerateProfileHandler,
    pub profile_image_description_handler: GenerateProfileImageDescriptionHandler,
    pub sample_profile_images_handler: GenerateSampleProfileImagesHandler,
    pub main_profile_image_handler: GenerateMainProfileImageHandler,
    pub generate_scenario_handler: GenerateScenarioHandler,
    pub scene_descriptions_handler: GenerateSceneDescriptionsHandler,
    pub scenario_images_handler: GenerateScenarioImagesHandler,
    pub surprise_me_handler: SurpriseMeHandler,
    pub respond_to_chat_handler: RespondToChatHandler,
    pub generate_speech_handler: GenerateSpeechHandler,
    pub set_models_handler: SetModelsHandler,
    pub force_idle_handler: ForceIdleHandler,

    // ========== Query Handlers ==========
    pub get_status_handler: GetStatusHandler,
    pub list_llm_models_handler: ListLlmModelsHandler,
    pub list_image_models_handler: ListImageModelsHandler,
    pub get_profile_handler: GetProfileHandler,
    pub list_profiles_handler: ListProfilesHandler,
    pub get_scenario_handler: GetScenarioHandler,
    pub list_scenarios_handler: ListScenariosHandler,
    pub get_messages_handler: GetMessagesHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(ctx: StageContext) -> Self {
        Self {
            gate: ctx.gate.clone(),
            executor: StageExecutor::new(),

            // Command handlers
            generate_profile_handler: GenerateProfileHandler::new(ctx.clone()),
            profile_image_description_handler: GenerateProfileImageDescriptionHandler::new(
                ctx.clone(),
            ),
            sample_profile_images_handler: GenerateSampleProfileImagesHandler::new(ctx.clone()),
            main_profile_image_handler: GenerateMainProfileImageHandler::new(ctx.clone()),
            generate_scenario_handler: GenerateScenarioHandler::new(ctx.clone()),
            scene_descriptions_handler: GenerateSceneDescriptionsHandler::new(ctx.clone()),
            scenario_images_handler: GenerateScenarioImagesHandler::new(ctx.clone()),
            surprise_me_handler: SurpriseMeHandler::new(ctx.clone()),
            respond_to_chat_handler: RespondToChatHandler::new(ctx.clone()),
            generate_speech_handler: GenerateSpeechHandler::new(ctx.clone()),
            set_models_handler: SetModelsHandler::new(ctx.gate.clone()),
            force_idle_handler: ForceIdleHandler::new(ctx.gate.clone()),

            // Query handlers
            get_status_handler: GetStatusHandler::new(ctx.gate.clone()),
            list_llm_models_handler: ListLlmModelsHandler::new(ctx.inference.clone()),
            list_image_models_handler: ListImageModelsHandler::new(ctx.images.clone()),
            get_profile_handler: GetProfileHandler::new(ctx.profiles.clone()),
            list_profiles_handler: ListProfilesHandler::new(ctx.profiles.clone()),
            get_scenario_handler: GetScenarioHandler::new(ctx.scenarios.clone()),
            list_scenarios_handler: ListScenariosHandler::new(ctx.scenarios.clone()),
            get_messages_handler: GetMessagesHandler::new(ctx.messages.clone()),
        }
    }
}
