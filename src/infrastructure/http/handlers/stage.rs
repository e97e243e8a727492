//! 阶段触发的公共逻辑

use axum::Json;
use std::future::Future;
use std::sync::Arc;

use crate::application::{ApplicationError, StageOutcome};
use crate::infrastructure::http::dto::{ApiResponse, StageResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;
use crate::infrastructure::worker::SubmitError;

pub type TriggerResponse = Json<ApiResponse<StageResponse<()>>>;

/// 把长耗时阶段提交到后台执行槽
///
/// 生成器不空闲或执行槽被占用时立即返回 `busy`。
pub async fn submit_stage<T, F>(
    state: &Arc<AppState>,
    task: &str,
    work: F,
) -> Result<TriggerResponse, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<StageOutcome<T>, ApplicationError>> + Send + 'static,
{
    let current = state.gate.status().await?;
    if !current.is_idle() {
        tracing::warn!(task = %task, status = %current.status, "Stage trigger rejected, generator busy");
        return Ok(Json(ApiResponse::success(StageResponse::Busy {
            status: current.status,
        })));
    }

    let response = match state.executor.submit(task, work) {
        Ok(_) => StageResponse::Accepted {
            task: task.to_string(),
        },
        Err(SubmitError::Occupied { running }) => StageResponse::Busy { status: running },
    };

    Ok(Json(ApiResponse::success(response)))
}

/// 请求未指定模型时使用已选择的模型
pub async fn resolve_model(
    state: &AppState,
    requested: Option<String>,
    kind: ModelKind,
) -> Result<String, ApiError> {
    if let Some(model) = requested.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()) {
        return Ok(model);
    }

    let status = state.gate.status().await?;
    let selected = match kind {
        ModelKind::Llm => status.llm_model,
        ModelKind::Image => status.image_model,
    };

    if selected.is_empty() {
        Err(ApiError::BadRequest(format!(
            "no {} model given and none selected",
            kind.as_str()
        )))
    } else {
        Ok(selected)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ModelKind {
    Llm,
    Image,
}

impl ModelKind {
    fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Llm => "language",
            ModelKind::Image => "image",
        }
    }
}
