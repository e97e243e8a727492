//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：各生成阶段及状态变更

mod conversation_commands;
mod profile_commands;
mod scenario_commands;
mod status_commands;

pub mod handlers;

pub use conversation_commands::*;
pub use profile_commands::*;
pub use scenario_commands::*;
pub use status_commands::*;
