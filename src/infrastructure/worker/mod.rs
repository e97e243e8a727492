//! Worker Layer - 后台阶段执行

mod stage_executor;

pub use stage_executor::{StageExecutor, SubmitError};
