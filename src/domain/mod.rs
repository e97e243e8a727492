//! Domain Layer - 领域层
//!
//! 不做任何 I/O 的纯逻辑:
//! - structured_output: 从模型文本恢复结构化数据、过滤推理旁路
//! - output_schema: 结构化输出模式与校验
//! - image: 图像请求、预设、通道事件、种子恢复
//! - generation_status: 全局生成状态记录与阶段标签
//! - prompts: 各阶段提示词

pub mod generation_status;
pub mod image;
pub mod output_schema;
pub mod prompts;

// 共享的结构化输出提取器
mod structured_output;

pub use generation_status::{error_label, GenerationStatus, StageKind, IDLE};
pub use output_schema::{FieldKind, OutputSchema, SchemaViolation, StructuredOutput};
pub use prompts::{ChatMessage, ChatRole};
pub use structured_output::{
    extract_structured, parse_literal, parse_structure, remove_thinking, LiteralError,
};
