//! 输出模式 (OutputSchema)
//!
//! 描述一次推理请求期望的结构化结果：一组具名、带类型的字段。
//! 既能生成供推理端点使用的 JSON Schema，也能校验提取出来的值。

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextList,
    Integer,
    Number,
    Boolean,
}

impl FieldKind {
    fn json_schema(&self) -> Value {
        match self {
            FieldKind::Text => json!({"type": "string"}),
            FieldKind::TextList => json!({"type": "array", "items": {"type": "string"}}),
            FieldKind::Integer => json!({"type": "integer"}),
            FieldKind::Number => json!({"type": "number"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::TextList => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::TextList => "list of strings",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
        }
    }
}

/// 单个字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub required: bool,
}

/// 校验失败
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("expected an object, got {0}")]
    NotAnObject(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// 结构化输出模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub fields: Vec<SchemaField>,
}

impl OutputSchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// 追加必填字段
    pub fn field(mut self, name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        self.fields.push(SchemaField {
            name,
            kind,
            description,
            required: true,
        });
        self
    }

    /// 追加可选字段
    pub fn optional_field(
        mut self,
        name: &'static str,
        kind: FieldKind,
        description: &'static str,
    ) -> Self {
        self.fields.push(SchemaField {
            name,
            kind,
            description,
            required: false,
        });
        self
    }

    /// JSON Schema 形式
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut schema = field.kind.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".to_string(), json!(field.description));
            }
            properties.insert(field.name.to_string(), schema);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// 原生类型化输出时附加到请求上的 `response_format`
    pub fn response_format(&self) -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.name,
                "schema": self.json_schema(),
                "strict": true,
            }
        })
    }

    /// 校验并返回对象
    ///
    /// 只检查声明过的字段，多余字段原样保留。
    pub fn validate(&self, value: Value) -> Result<Map<String, Value>, SchemaViolation> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(SchemaViolation::NotAnObject(type_name(&other).to_string())),
        };

        for field in &self.fields {
            match map.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(SchemaViolation::MissingField(field.name));
                }
                None | Some(Value::Null) => {}
                Some(v) if !field.kind.accepts(v) => {
                    return Err(SchemaViolation::WrongType {
                        field: field.name,
                        expected: field.kind.name(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(map)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 可由推理端点直接产出的类型
pub trait StructuredOutput: DeserializeOwned + Send {
    fn schema() -> OutputSchema;
}
