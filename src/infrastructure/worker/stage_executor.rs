//! Stage Executor - 后台执行长耗时生成阶段
//!
//! 只有一个执行槽：槽被占用时直接拒绝，不排队。
//! 与生成门互补：门保证同一时刻只有一个外部调用，执行槽保证 HTTP 触发的
//! 长任务不会在后台堆积。

use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::application::{ApplicationError, StageOutcome};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("stage executor is occupied by {running}")]
    Occupied { running: String },
}

/// 任务结束（包括 panic）时先清空任务名，再归还执行槽
struct SlotGuard {
    running: Arc<Mutex<Option<String>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        *self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// 单槽阶段执行器
pub struct StageExecutor {
    slot: Arc<Semaphore>,
    running: Arc<Mutex<Option<String>>>,
}

impl Default for StageExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StageExecutor {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// 正在执行的任务名
    pub fn running(&self) -> Option<String> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 提交任务；槽被占用时立即返回 `Occupied`
    pub fn submit<T, F>(&self, name: &str, work: F) -> Result<JoinHandle<()>, SubmitError>
    where
        T: Send + 'static,
        F: Future<Output = Result<StageOutcome<T>, ApplicationError>> + Send + 'static,
    {
        let permit = match self.slot.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let running = self.running().unwrap_or_else(|| "unknown".to_string());
                tracing::warn!(task = %name, running = %running, "Stage executor occupied");
                return Err(SubmitError::Occupied { running });
            }
        };

        *self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(name.to_string());

        let guard = SlotGuard {
            running: self.running.clone(),
            _permit: permit,
        };
        let name = name.to_string();

        tracing::info!(task = %name, "Stage task submitted");

        Ok(tokio::spawn(async move {
            let _guard = guard;
            match work.await {
                Ok(StageOutcome::Completed(_)) => {
                    tracing::info!(task = %name, "Stage task completed");
                }
                Ok(StageOutcome::Busy { status }) => {
                    tracing::warn!(task = %name, status = %status, "Stage task rejected, generator busy");
                }
                Err(e) => {
                    tracing::error!(task = %name, error = %e, "Stage task failed");
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_single_slot() {
        let executor = StageExecutor::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let handle = executor
            .submit("profile", async move {
                let _ = release_rx.await;
                Ok(StageOutcome::Completed(()))
            })
            .unwrap();

        assert_eq!(executor.running().as_deref(), Some("profile"));
        let rejected = executor.submit("scenario", async { Ok(StageOutcome::Completed(())) });
        assert_eq!(
            rejected.unwrap_err(),
            SubmitError::Occupied {
                running: "profile".to_string()
            }
        );

        release_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(executor.running().is_none());
        executor
            .submit("scenario", async { Ok(StageOutcome::Completed(())) })
            .unwrap()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_slot_released_after_failure() {
        let executor = StageExecutor::new();
        executor
            .submit::<(), _>("speech", async {
                Err(ApplicationError::internal("boom"))
            })
            .unwrap()
            .await
            .unwrap();

        assert!(executor.running().is_none());
        assert!(executor
            .submit("speech", async { Ok(StageOutcome::Completed(1)) })
            .is_ok());
    }

    fn executor_should_panic() -> bool {
        true
    }

    #[tokio::test]
    async fn test_slot_released_after_panic() {
        let executor = StageExecutor::new();
        let handle = executor
            .submit("scenario", async {
                if executor_should_panic() {
                    panic!("renderer exploded");
                }
                Ok(StageOutcome::Completed(()))
            })
            .unwrap();

        assert!(handle.await.unwrap_err().is_panic());
        assert!(executor.running().is_none());
        assert!(executor
            .submit("profile", async { Ok(StageOutcome::Completed(())) })
            .is_ok());
    }
}
