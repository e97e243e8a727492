//! In-Memory Model Usage Store
//!
//! 单进程部署或测试用：互斥锁保护唯一的状态记录，锁不跨越 await。

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::application::ports::{ModelUsageRepositoryPort, RepositoryError};
use crate::domain::GenerationStatus;

/// 内存生成状态存储
pub struct InMemoryModelUsageStore {
    record: Mutex<GenerationStatus>,
}

impl InMemoryModelUsageStore {
    pub fn new() -> Self {
        Self {
            record: Mutex::new(GenerationStatus::default()),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, GenerationStatus> {
        // 持锁期间不会 panic，中毒时沿用内部值
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryModelUsageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelUsageRepositoryPort for InMemoryModelUsageStore {
    async fn get(&self) -> Result<GenerationStatus, RepositoryError> {
        Ok(self.lock().clone())
    }

    async fn save_models(
        &self,
        llm_model: &str,
        image_model: &str,
        tts_model: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut record = self.lock();
        record.llm_model = llm_model.to_string();
        record.image_model = image_model.to_string();
        record.tts_model = tts_model.map(str::to_string);
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        expected: &str,
        new_status: &str,
    ) -> Result<bool, RepositoryError> {
        let mut record = self.lock();
        if record.status != expected {
            return Ok(false);
        }
        record.status = new_status.to_string();
        Ok(true)
    }

    async fn set_status(&self, status: &str) -> Result<String, RepositoryError> {
        let mut record = self.lock();
        Ok(std::mem::replace(&mut record.status, status.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IDLE;

    #[tokio::test]
    async fn test_compare_and_set() {
        let store = InMemoryModelUsageStore::new();

        assert!(store.compare_and_set_status(IDLE, "busy").await.unwrap());
        assert!(!store.compare_and_set_status(IDLE, "other").await.unwrap());
        assert_eq!(store.get().await.unwrap().status, "busy");

        assert_eq!(store.set_status(IDLE).await.unwrap(), "busy");
        assert!(store.get().await.unwrap().is_idle());
    }
}
