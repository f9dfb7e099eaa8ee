use crate::core::batch::BatchOrchestrator;
use crate::domain::model::{BatchOutcome, BatchSummary};
use crate::domain::ports::{Acquirer, ResultStore, TempoEstimator};
use crate::utils::error::{BpmError, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum BatchState {
    Pending,
    Running,
    Completed(BatchSummary),
    Failed(String),
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Completed(_) | BatchState::Failed(_))
    }
}

/// 背景執行中的批次；前端可輪詢 `state()` 或訂閱狀態變化
pub struct BatchHandle {
    state: watch::Receiver<BatchState>,
    join: JoinHandle<Result<BatchOutcome>>,
}

impl BatchHandle {
    pub fn state(&self) -> BatchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> Result<BatchOutcome> {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => Err(BpmError::TaskError {
                message: e.to_string(),
            }),
        }
    }
}

/// 批次未正常結束（panic 或被中止）時把狀態設為 `Failed`，避免停在 `Running`
struct StateGuard {
    tx: watch::Sender<BatchState>,
    settled: bool,
}

impl StateGuard {
    fn settle(&mut self, state: BatchState) {
        self.tx.send_replace(state);
        self.settled = true;
    }
}

impl Drop for StateGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.tx
                .send_replace(BatchState::Failed("batch task did not finish".to_string()));
        }
    }
}

impl<S, A, E> BatchOrchestrator<S, A, E>
where
    S: ResultStore + 'static,
    A: Acquirer + ?Sized + 'static,
    E: TempoEstimator + ?Sized + 'static,
{
    /// 在 runtime 上啟動批次並立即回傳 handle
    pub fn spawn(self: &Arc<Self>, requested: Vec<String>) -> BatchHandle {
        let (tx, rx) = watch::channel(BatchState::Pending);
        let orchestrator = Arc::clone(self);

        let join = tokio::spawn(async move {
            let mut guard = StateGuard { tx, settled: false };
            guard.tx.send_replace(BatchState::Running);
            let outcome = orchestrator.run(&requested).await;
            match &outcome {
                Ok(outcome) => guard.settle(BatchState::Completed(outcome.summary.clone())),
                Err(e) => guard.settle(BatchState::Failed(e.to_string())),
            }
            outcome
        });

        BatchHandle { state: rx, join }
    }
}
