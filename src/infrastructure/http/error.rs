//! HTTP Error Handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const UNPROCESSABLE: i32 = 422;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const BAD_GATEWAY: i32 = 502;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// 模型输出被过滤或无法解析
    Unprocessable(String),
    Internal(String),
    /// 上游服务返回错误
    BadGateway(String),
    /// 上游服务暂时不可用（已重试）
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(&self) -> (i32, &str) {
        match self {
            ApiError::NotFound(msg) => (errno::NOT_FOUND, msg.as_str()),
            ApiError::BadRequest(msg) => (errno::BAD_REQUEST, msg.as_str()),
            ApiError::Unprocessable(msg) => (errno::UNPROCESSABLE, msg.as_str()),
            ApiError::Internal(msg) => (errno::INTERNAL_ERROR, msg.as_str()),
            ApiError::BadGateway(msg) => (errno::BAD_GATEWAY, msg.as_str()),
            ApiError::ServiceUnavailable(msg) => (errno::SERVICE_UNAVAILABLE, msg.as_str()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, msg) = self.parts();

        if code >= errno::INTERNAL_ERROR {
            tracing::error!(errno = code, error = %msg, "Request failed");
        } else {
            tracing::warn!(errno = code, error = %msg, "Request rejected");
        }

        (StatusCode::OK, Json(ErrorResponse::new(code, msg))).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        let message = e.to_string();
        match e {
            ApplicationError::NotFound { .. } => ApiError::NotFound(message),
            ApplicationError::PreconditionFailed(_)
            | ApplicationError::PreconditionSeedMissing(_)
            | ApplicationError::ValidationError(_) => ApiError::BadRequest(message),
            ApplicationError::ContentFiltered(_)
            | ApplicationError::MalformedStructuredOutput(_) => ApiError::Unprocessable(message),
            ApplicationError::TransientProvider(_) => ApiError::ServiceUnavailable(message),
            ApplicationError::Protocol(_) | ApplicationError::ExternalServiceError(_) => {
                ApiError::BadGateway(message)
            }
            ApplicationError::RepositoryError(_)
            | ApplicationError::StorageError(_)
            | ApplicationError::InternalError(_) => ApiError::Internal(message),
        }
    }
}
