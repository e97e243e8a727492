//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod image_engine;
mod inference_engine;
mod repositories;
mod speech_engine;

pub use image_engine::{ImageEnginePort, ImageError};
pub use inference_engine::{
    generate_structured, generate_text, InferenceEnginePort, InferenceError, InferenceOutput,
    InferenceProviderPort,
};
pub use repositories::{
    MessageRecord, MessageRepositoryPort, MessageRole, ModelUsageRepositoryPort, ProfileRecord,
    ProfileRepositoryPort, RepositoryError, ScenarioRecord, ScenarioRepositoryPort,
};
pub use speech_engine::{SpeechEnginePort, SpeechError, SpeechRequest, SpeechResponse};
