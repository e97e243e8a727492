//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（推理、图像、语音、Repository）
//! - gate: 生成任务互斥门
//! - retry: 固定间隔重试
//! - commands: CQRS 命令及处理器（各生成阶段）
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod gate;
pub mod ports;
pub mod queries;
pub mod retry;

// Re-exports
pub use commands::{
    ForceIdle, GenerateMainProfileImage, GenerateProfile, GenerateProfileImageDescription,
    GenerateSampleProfileImages, GenerateScenario, GenerateScenarioImages,
    GenerateSceneDescriptions, GenerateSpeech, RespondToChat, SetModels, SurpriseMe,
    // Handlers
    handlers::{
        ChatExchange, ForceIdleHandler, GenerateMainProfileImageHandler, GenerateProfileHandler,
        GenerateProfileImageDescriptionHandler, GenerateSampleProfileImagesHandler,
        GenerateScenarioHandler, GenerateScenarioImagesHandler, GenerateSceneDescriptionsHandler,
        GenerateSpeechHandler, RespondToChatHandler, SetModelsHandler, StageContext,
        SurpriseMeHandler, SurpriseResult,
    },
};

pub use error::ApplicationError;
pub use gate::{GateAcquisition, GenerationGate, ReleaseOutcome, StageOutcome};
pub use retry::{retry_with_fixed_delay, RetryPolicy};

pub use ports::{
    ImageEnginePort, ImageError, InferenceEnginePort, InferenceError, InferenceOutput,
    InferenceProviderPort, MessageRecord, MessageRepositoryPort, MessageRole,
    ModelUsageRepositoryPort, ProfileRecord, ProfileRepositoryPort, RepositoryError,
    ScenarioRecord, ScenarioRepositoryPort, SpeechEnginePort, SpeechError, SpeechRequest,
    SpeechResponse,
};

pub use queries::{
    GetMessages, GetProfile, GetScenario, GetStatus, ListImageModels, ListLlmModels,
    ListProfiles, ListScenarios,
    // Handlers
    handlers::{
        GetMessagesHandler, GetProfileHandler, GetScenarioHandler, GetStatusHandler,
        ListImageModelsHandler, ListLlmModelsHandler, ListProfilesHandler, ListScenariosHandler,
    },
};
