//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：状态、模型列表、角色与情景读取

mod profile_queries;
mod status_queries;

pub mod handlers;

pub use profile_queries::*;
pub use status_queries::*;
