//! StoryForge - 角色设定、情景、图像、对话与语音的生成服务
//!
//! 架构设计: CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 生成状态、类型化输出（Schema / 提取 / 字面量解析）
//! - 提示词模板、图像预设与双工通道帧
//!
//! 应用层 (application/):
//! - Ports: 推理、图像、语音、Repository 端口
//! - Gate: 全局唯一的生成门，忙碌即拒绝
//! - Commands: 各生成阶段
//! - Queries: 状态、模型列表、记录查询
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP 推理客户端、图像渲染双工客户端、语音合成客户端
//! - Persistence: SQLite
//! - Memory: 生成状态的内存实现
//! - Worker: 单槽后台阶段执行
//! - HTTP: 触发与查询 API

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
