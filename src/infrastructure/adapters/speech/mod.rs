//! Speech Adapter - HTTP 语音合成客户端

mod http_speech_client;

pub use http_speech_client::{strip_action_text, HttpSpeechClient, HttpSpeechClientConfig};
