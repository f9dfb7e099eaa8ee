//! Bounded fan-out of independent per-item units.
//!
//! A phase spawns one task per item, at most `limit` of them run at once, and
//! the caller drains every task before the phase returns. There is no timeout
//! or cancellation here: a unit that never finishes stalls the phase.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// 預設工作數：可用平行度 × 2 + 1
pub fn default_worker_limit() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    parallelism * 2 + 1
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    limit: usize,
}

impl WorkerPool {
    pub fn new(name: &'static str, limit: usize) -> Self {
        Self {
            name,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 執行所有工作並等待全部完成。
    ///
    /// 回傳值與輸入順序一一對應；panic 的工作對應位置為 `None`。
    /// `on_finished(index, outcome)` 只在呼叫端的 task 上被呼叫。
    pub async fn run<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        work: F,
        mut on_finished: impl FnMut(usize, Option<&R>),
    ) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Option<R>> + Send,
    {
        let total = items.len();
        let mut outcomes: Vec<Option<R>> = (0..total).map(|_| None).collect();
        if total == 0 {
            return outcomes;
        }

        tracing::debug!(
            pool = self.name,
            total,
            limit = self.limit,
            "Dispatching work units"
        );

        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let work = work.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // semaphore 從未關閉，取得失敗時直接視為該筆失敗
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, None),
                };
                (index, work(item).await)
            });
        }

        let mut panicked = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    on_finished(index, outcome.as_ref());
                    outcomes[index] = outcome;
                }
                Err(e) => {
                    panicked += 1;
                    tracing::error!(pool = self.name, "❌ Work unit aborted: {}", e);
                }
            }
        }

        if panicked > 0 {
            tracing::warn!(
                pool = self.name,
                panicked,
                "⚠️ Some work units did not complete; their items are treated as failed"
            );
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_respects_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new("test", 2);

        let work = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            move |n: u32| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Some(n * 10)
                }
            }
        };

        let outcomes = pool.run((0..8).collect(), work, |_, _| {}).await;

        assert_eq!(outcomes.len(), 8);
        assert_eq!(outcomes[3], Some(30));
        // 工作數多於上限時應剛好跑滿上限
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let pool = WorkerPool::new("test", 4);
        let outcomes = pool
            .run(
                vec![30u64, 10, 20],
                |delay| async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Some(delay)
                },
                |_, _| {},
            )
            .await;

        assert_eq!(outcomes, vec![Some(30), Some(10), Some(20)]);
    }

    #[tokio::test]
    async fn test_failed_and_panicking_units_are_isolated() {
        let pool = WorkerPool::new("test", 3);
        let mut finished = Vec::new();

        let outcomes = pool
            .run(
                vec![1, 2, 3],
                |n: i32| async move {
                    match n {
                        2 => None,
                        3 => panic!("unit blew up"),
                        _ => Some(n),
                    }
                },
                |index, outcome| finished.push((index, outcome.is_some())),
            )
            .await;

        assert_eq!(outcomes, vec![Some(1), None, None]);
        finished.sort();
        assert_eq!(finished, vec![(0, true), (1, false)]);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(WorkerPool::new("test", 0).limit(), 1);
        assert!(default_worker_limit() >= 3);
    }
}
