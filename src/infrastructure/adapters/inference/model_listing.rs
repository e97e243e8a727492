//! 模型列表响应
//!
//! 不同服务返回的形状不同：`{"models": [...]}`、`{"data": [...]}` 或裸数组；
//! 每一项可能是字符串，也可能是带名称与能力信息的对象。

use serde::Deserialize;
use serde_json::Value;

/// 原生类型化输出对应的能力标记
const SCHEMA_CAPABILITIES: &[&str] = &[
    "json_schema",
    "response_schema",
    "structured_output",
    "structured_outputs",
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ModelListing {
    Wrapped { models: Vec<ModelEntry> },
    Listed { data: Vec<ModelEntry> },
    Bare(Vec<ModelEntry>),
}

impl ModelListing {
    pub fn into_entries(self) -> Vec<ModelEntry> {
        match self {
            ModelListing::Wrapped { models } => models,
            ModelListing::Listed { data } => data,
            ModelListing::Bare(entries) => entries,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModelEntry {
    Name(String),
    Detailed(ModelDetails),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    id: Option<String>,
    /// 字符串数组，或 `{能力: bool}` 对象
    #[serde(default)]
    capabilities: Option<Value>,
    #[serde(default)]
    supports_response_schema: Option<bool>,
}

impl ModelEntry {
    pub fn name(&self) -> &str {
        match self {
            ModelEntry::Name(name) => name,
            ModelEntry::Detailed(details) => details
                .name
                .as_deref()
                .or(details.model.as_deref())
                .or(details.id.as_deref())
                .unwrap_or(""),
        }
    }

    /// 是否匹配请求的模型名（忽略 `:latest` 标签）
    pub fn matches(&self, model: &str) -> bool {
        let name = self.name();
        !name.is_empty()
            && (name == model
                || name.strip_suffix(":latest") == Some(model)
                || model.strip_suffix(":latest") == Some(name))
    }

    pub fn supports_native_schema(&self) -> bool {
        let details = match self {
            ModelEntry::Name(_) => return false,
            ModelEntry::Detailed(details) => details,
        };

        if details.supports_response_schema == Some(true) {
            return true;
        }

        match &details.capabilities {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .any(|c| SCHEMA_CAPABILITIES.contains(&c)),
            Some(Value::Object(map)) => SCHEMA_CAPABILITIES
                .iter()
                .any(|c| map.get(*c).and_then(Value::as_bool) == Some(true)),
            _ => false,
        }
    }
}

/// 去掉路由前缀（如 `ollama_chat/llama3` → `llama3`）
pub fn wire_model_name(model: &str) -> &str {
    const PROVIDER_PREFIXES: &[&str] = &["ollama_chat/", "ollama/", "openai/"];
    PROVIDER_PREFIXES
        .iter()
        .find_map(|prefix| model.strip_prefix(prefix))
        .unwrap_or(model)
}
