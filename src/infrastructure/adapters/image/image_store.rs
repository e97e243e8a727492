//! Image Store - 将渲染服务产出的图像下载到本地目录
//!
//! 文件名沿用远端路径的最后一段（种子编码在其中）

use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::ImageError;
use crate::domain::image::resolve_image_url;

/// 本地图像存储
pub struct ImageStore {
    http: Client,
    /// 渲染服务基础 URL，用于解析相对引用
    base_url: String,
    output_dir: PathBuf,
}

impl ImageStore {
    /// 创建存储并确保目录存在
    pub async fn new(
        http: Client,
        base_url: impl Into<String>,
        output_dir: impl AsRef<Path>,
    ) -> Result<Self, ImageError> {
        let output_dir = output_dir.as_ref().to_path_buf();

        fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| ImageError::Io(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            output_dir,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 目标路径：输出目录 + 远端文件名
    fn local_path(&self, url: &str) -> Result<PathBuf, ImageError> {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = without_query
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .ok_or_else(|| ImageError::Download(format!("no file name in {}", url)))?;

        Ok(self.output_dir.join(file_name))
    }

    /// 下载一张图像，返回本地路径
    pub async fn download(&self, reference: &str) -> Result<String, ImageError> {
        if reference.trim().is_empty() {
            return Err(ImageError::Download("empty image reference".to_string()));
        }

        let url = resolve_image_url(&self.base_url, reference);
        let path = self.local_path(&url)?;

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ImageError::Download(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Download(format!("{}: HTTP {}", url, status)));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| ImageError::Download(format!("{}: {}", url, e)))?;

        fs::write(&path, &data)
            .await
            .map_err(|e| ImageError::Io(e.to_string()))?;

        tracing::debug!(
            url = %url,
            path = %path.display(),
            size = data.len(),
            "Saved image"
        );

        Ok(path.to_string_lossy().into_owned())
    }
}
