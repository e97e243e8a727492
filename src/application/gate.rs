//! Execution Gate - 生成任务互斥门
//!
//! 以全局生成状态记录为唯一同步点：状态为 idle 时原子地写入阶段标签即为占用，
//! 结束时写回 idle 或错误标签。占用失败不是错误，而是 `Busy` 信号。

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::ModelUsageRepositoryPort;
use crate::domain::{error_label, GenerationStatus, StageKind, IDLE};

/// 占用结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAcquisition {
    Acquired,
    /// 已被占用，附带当前状态文本
    Busy { current: String },
}

/// 释放时的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Success,
    Failed(String),
}

/// 阶段执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Busy { status: String },
}

impl<T> StageOutcome<T> {
    pub fn is_busy(&self) -> bool {
        matches!(self, StageOutcome::Busy { .. })
    }

    pub fn completed(self) -> Option<T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Busy { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Completed(value) => StageOutcome::Completed(f(value)),
            StageOutcome::Busy { status } => StageOutcome::Busy { status },
        }
    }
}

/// Execution Gate
pub struct GenerationGate {
    usage: Arc<dyn ModelUsageRepositoryPort>,
}

impl GenerationGate {
    pub fn new(usage: Arc<dyn ModelUsageRepositoryPort>) -> Self {
        Self { usage }
    }

    /// 尝试占用；不在内部重试
    pub async fn try_acquire(&self, label: &str) -> Result<GateAcquisition, ApplicationError> {
        if self.usage.compare_and_set_status(IDLE, label).await? {
            tracing::debug!(stage = %label, "Generation gate acquired");
            return Ok(GateAcquisition::Acquired);
        }

        let current = self.usage.get().await?.status;
        Ok(GateAcquisition::Busy { current })
    }

    /// 释放：成功写回 idle，失败写入错误标签
    pub async fn release(&self, outcome: ReleaseOutcome) -> Result<(), ApplicationError> {
        let status = match &outcome {
            ReleaseOutcome::Success => IDLE.to_string(),
            ReleaseOutcome::Failed(cause) => error_label(cause),
        };
        let previous = self.usage.set_status(&status).await?;
        tracing::debug!(previous = %previous, status = %status, "Generation gate released");
        Ok(())
    }

    /// 运维恢复：无条件置为 idle，返回之前的状态
    ///
    /// 不会中断仍在进行的外部调用，其结束时仍会写回状态。
    pub async fn force_idle(&self) -> Result<String, ApplicationError> {
        let previous = self.usage.set_status(IDLE).await?;
        if previous != IDLE {
            tracing::warn!(previous = %previous, "Generation status forced to idle");
        }
        Ok(previous)
    }

    pub async fn status(&self) -> Result<GenerationStatus, ApplicationError> {
        Ok(self.usage.get().await?)
    }

    /// 更新当前模型，不影响状态
    pub async fn set_models(
        &self,
        llm_model: &str,
        image_model: &str,
        tts_model: Option<&str>,
    ) -> Result<GenerationStatus, ApplicationError> {
        self.usage
            .save_models(llm_model, image_model, tts_model)
            .await?;
        self.status().await
    }

    /// 在门内执行一个阶段
    ///
    /// 占用失败直接返回 `Busy`，不执行 `work`。`work` 无论成功、出错还是 panic，
    /// 门都会被释放。
    pub async fn run_stage<T, F, Fut>(
        &self,
        stage: StageKind,
        work: F,
    ) -> Result<StageOutcome<T>, ApplicationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        if let GateAcquisition::Busy { current } = self.try_acquire(stage.label()).await? {
            tracing::warn!(stage = %stage, current = %current, "Generation busy, stage rejected");
            return Ok(StageOutcome::Busy { status: current });
        }

        tracing::info!(stage = %stage, "Stage started");

        let result = match AssertUnwindSafe(work()).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(ApplicationError::internal(format!("{} panicked", stage))),
        };

        match result {
            Ok(value) => {
                self.release(ReleaseOutcome::Success).await?;
                tracing::info!(stage = %stage, "Stage completed");
                Ok(StageOutcome::Completed(value))
            }
            Err(e) => {
                tracing::error!(stage = %stage, error = %e, "Stage failed");
                if let Err(release_err) = self.release(ReleaseOutcome::Failed(e.to_string())).await {
                    tracing::error!(stage = %stage, error = %release_err, "Failed to release generation gate");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::InMemoryModelUsageStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn gate() -> Arc<GenerationGate> {
        Arc::new(GenerationGate::new(Arc::new(InMemoryModelUsageStore::new())))
    }

    #[tokio::test]
    async fn test_acquire_then_busy() {
        let gate = gate();

        assert_eq!(
            gate.try_acquire("Generating Profile").await.unwrap(),
            GateAcquisition::Acquired
        );
        assert_eq!(
            gate.try_acquire("Generating Scenario").await.unwrap(),
            GateAcquisition::Busy {
                current: "Generating Profile".to_string()
            }
        );

        gate.release(ReleaseOutcome::Success).await.unwrap();
        assert!(gate.status().await.unwrap().is_idle());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquisitions_are_mutually_exclusive() {
        let gate = gate();
        let mut handles = Vec::new();

        for i in 0..64 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.try_acquire(&format!("stage {}", i)).await.unwrap()
            }));
        }

        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap() == GateAcquisition::Acquired {
                acquired += 1;
            }
        }
        assert_eq!(acquired, 1);
    }

    #[tokio::test]
    async fn test_failed_release_writes_error_label() {
        let gate = gate();
        gate.try_acquire("x").await.unwrap();
        gate.release(ReleaseOutcome::Failed("boom".into()))
            .await
            .unwrap();

        let status = gate.status().await.unwrap();
        assert_eq!(status.status, "Error: boom");

        // 错误标签同样阻止新的占用
        assert!(matches!(
            gate.try_acquire("y").await.unwrap(),
            GateAcquisition::Busy { .. }
        ));

        assert_eq!(gate.force_idle().await.unwrap(), "Error: boom");
        assert_eq!(gate.try_acquire("y").await.unwrap(), GateAcquisition::Acquired);
    }

    #[tokio::test]
    async fn test_run_stage_releases_on_success_error_and_panic() {
        let gate = gate();

        let ok = gate
            .run_stage(StageKind::Profile, || async { Ok::<_, ApplicationError>(7) })
            .await
            .unwrap();
        assert_eq!(ok, StageOutcome::Completed(7));
        assert!(gate.status().await.unwrap().is_idle());

        let err = gate
            .run_stage(StageKind::Scenario, || async {
                Err::<(), _>(ApplicationError::Protocol("no images".into()))
            })
            .await;
        assert!(matches!(err, Err(ApplicationError::Protocol(_))));
        let status = gate.status().await.unwrap();
        assert!(status.is_error());
        assert!(status.status.contains("no images"));

        gate.force_idle().await.unwrap();
        let panicked = gate
            .run_stage(StageKind::Speech, || async {
                if true {
                    panic!("injected");
                }
                Ok::<(), ApplicationError>(())
            })
            .await;
        assert!(matches!(panicked, Err(ApplicationError::InternalError(_))));
        assert!(gate.status().await.unwrap().is_error());
    }

    #[tokio::test]
    async fn test_busy_stage_has_no_side_effects() {
        let gate = gate();
        gate.try_acquire("Generating Scenario Images").await.unwrap();

        let calls = AtomicU32::new(0);
        let outcome = gate
            .run_stage(StageKind::Profile, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApplicationError>(())
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            StageOutcome::Busy {
                status: "Generating Scenario Images".to_string()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            gate.status().await.unwrap().status,
            "Generating Scenario Images"
        );
    }

    #[tokio::test]
    async fn test_set_models_keeps_status() {
        let gate = gate();
        gate.try_acquire("busy").await.unwrap();
        let status = gate
            .set_models("llama3", "sdxl", Some("kokoro"))
            .await
            .unwrap();
        assert_eq!(status.llm_model, "llama3");
        assert_eq!(status.tts_model.as_deref(), Some("kokoro"));
        assert_eq!(status.status, "busy");
    }
}
