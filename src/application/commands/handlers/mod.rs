//! Command Handlers 实现
//!
//! 生成阶段（Generation Orchestrator）与状态命令

mod context;
mod conversation_handlers;
mod profile_handlers;
mod scenario_handlers;
mod status_handlers;
mod surprise_handlers;

pub use context::StageContext;
pub use conversation_handlers::*;
pub use profile_handlers::*;
pub use scenario_handlers::*;
pub use status_handlers::*;
pub use surprise_handlers::*;
