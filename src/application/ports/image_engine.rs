//! Image Engine Port - 图像渲染服务抽象

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::image::ImageGenerationRequest;

/// 图像生成错误
#[derive(Debug, Error)]
pub enum ImageError {
    /// 会话创建在等待时限内未成功
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Service error: HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    /// 双工通道在完成前关闭或出错
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Model selection failed: {0}")]
    ModelSelection(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Image Engine Port
#[async_trait]
pub trait ImageEnginePort: Send + Sync {
    /// 生成图像并保存到本地，按到达顺序返回本地路径
    ///
    /// 通道提前结束时返回已收到的部分结果；空列表由调用方判定为失败。
    async fn generate(&self, request: &ImageGenerationRequest) -> Result<Vec<String>, ImageError>;

    async fn list_models(&self) -> Result<Vec<String>, ImageError>;

    /// 删除本地图像文件，失败只记录日志
    async fn discard(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path, error = %e, "Failed to delete image file");
            } else {
                tracing::debug!(path = %path, "Deleted image file");
            }
        }
    }
}
