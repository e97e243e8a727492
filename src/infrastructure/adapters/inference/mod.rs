//! Inference Adapter - OpenAI 兼容文本生成服务

mod http_inference_client;
mod model_listing;

pub use http_inference_client::{
    HttpInferenceClient, HttpInferenceConfig, HttpInferenceProvider, StructuredOutputMode,
};
