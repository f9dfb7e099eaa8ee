use crate::core::cleanup::Cleanup;
use crate::core::partition::{merge, partition, Partition};
use crate::core::pool::{default_worker_limit, WorkerPool};
use crate::domain::model::{
    round_tempo, Acquisition, BatchOutcome, BatchSummary, FailureStage, ItemFailure, Query,
    ResultRecord,
};
use crate::domain::ports::{Acquirer, ConfigProvider, ResultStore, TempoEstimator};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub work_dir: PathBuf,
    pub audio_extension: String,
    pub acquire_workers: usize,
    pub estimate_workers: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            audio_extension: "mp3".to_string(),
            acquire_workers: default_worker_limit(),
            estimate_workers: default_worker_limit(),
        }
    }
}

impl BatchSettings {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            work_dir: PathBuf::from(config.work_dir()),
            audio_extension: config.audio_extension().to_string(),
            acquire_workers: config.acquire_workers(),
            estimate_workers: config.estimate_workers(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Acquisition,
    Estimation,
}

/// 進度事件，只會由協調 task 送出
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    PhaseStarted {
        phase: Phase,
        total: usize,
    },
    ItemFinished {
        phase: Phase,
        title: String,
        succeeded: bool,
        completed: usize,
        total: usize,
    },
    Committed {
        records: usize,
    },
    CleanedUp {
        removed: usize,
    },
}

/// 批次協調器：分組、並行取得、並行估計、合併、寫回、清理
pub struct BatchOrchestrator<S, A: ?Sized, E: ?Sized> {
    store: S,
    acquirer: Arc<A>,
    estimator: Arc<E>,
    settings: BatchSettings,
    progress: Option<UnboundedSender<ProgressEvent>>,
    monitor: SystemMonitor,
}

impl<S, A, E> BatchOrchestrator<S, A, E>
where
    S: ResultStore,
    A: Acquirer + ?Sized + 'static,
    E: TempoEstimator + ?Sized + 'static,
{
    pub fn new(store: S, acquirer: Arc<A>, estimator: Arc<E>, settings: BatchSettings) -> Self {
        Self {
            store,
            acquirer,
            estimator,
            settings,
            progress: None,
            monitor: SystemMonitor::default(),
        }
    }

    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            // 接收端關閉時忽略
            let _ = sender.send(event);
        }
    }

    /// 哪些請求已有儲存的結果
    pub async fn known_titles(&self, requested: &[String]) -> Vec<(String, bool)> {
        let existing = self.store.load().await;
        requested
            .iter()
            .map(|title| (title.clone(), existing.contains(title)))
            .collect()
    }

    pub async fn clear_results(&self) -> Result<()> {
        self.store.clear().await?;
        tracing::info!("🗑️ Stored results cleared");
        Ok(())
    }

    pub async fn run(&self, requested: &[String]) -> Result<BatchOutcome> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let existing = self.store.load().await;
        let Partition {
            to_reuse,
            to_process,
        } = partition(&existing, requested);

        tracing::info!(
            "🔎 {} requested: {} reused from cache, {} to process",
            requested.len(),
            distinct(&to_reuse),
            to_process.len()
        );
        self.monitor.log_phase("Partition");

        let mut errors = Vec::new();

        // 取得音訊
        let acquisitions = self.acquire_all(&to_process).await;
        self.monitor.log_phase("Acquisition");

        let mut survivors: Vec<(String, Acquisition, PathBuf)> = Vec::new();
        for (title, acquisition) in to_process.iter().zip(acquisitions) {
            match acquisition {
                Some(acquisition) => match acquisition.usable_path().cloned() {
                    Some(path) => survivors.push((title.clone(), acquisition, path)),
                    None => {
                        let reason = match &acquisition.local_path {
                            Some(path) => format!("audio file {} not found", path.display()),
                            None => "no audio was obtained".to_string(),
                        };
                        errors.push(failure(title, FailureStage::Acquisition, reason));
                    }
                },
                None => errors.push(failure(
                    title,
                    FailureStage::Acquisition,
                    "acquisition did not complete".to_string(),
                )),
            }
        }

        // 估計 BPM
        let tempos = self.estimate_all(&survivors).await;
        self.monitor.log_phase("Estimation");

        let mut produced = Vec::with_capacity(survivors.len());
        for ((title, acquisition, path), tempo) in survivors.into_iter().zip(tempos) {
            match tempo {
                Some(tempo) => produced.push(ResultRecord::new(title, &acquisition, tempo)),
                None => errors.push(failure(
                    &title,
                    FailureStage::Estimation,
                    format!("no tempo for {}", path.display()),
                )),
            }
        }

        for error in &errors {
            tracing::error!("❌ {}", error);
        }

        let results = merge(requested, &existing, produced);
        let processed = results
            .records()
            .iter()
            .filter(|record| !existing.contains(&record.imported_title))
            .count();
        let mean_tempo = results.mean_tempo();

        let commit = self.store.replace(&results).await;

        // 不論成功與否都要清理暫存音訊
        let cleanup = Cleanup::new(&self.settings.work_dir, &self.settings.audio_extension);
        let sweep = cleanup.sweep().await;
        self.emit(ProgressEvent::CleanedUp {
            removed: sweep.removed,
        });
        if sweep.failed > 0 {
            tracing::warn!("⚠️ {} transient files could not be removed", sweep.failed);
        }

        if let Err(e) = commit {
            tracing::error!("❌ Commit failed, previous results left intact: {}", e);
            return Err(e);
        }
        self.emit(ProgressEvent::Committed {
            records: results.len(),
        });

        let summary = BatchSummary {
            started_at,
            requested: requested.len(),
            reused: distinct(&to_reuse),
            processed,
            failed: errors.len(),
            mean_tempo,
            elapsed: clock.elapsed(),
        };

        tracing::info!(
            "✅ Batch complete: {} records ({} new, {} reused, {} failed), average BPM {:.2}",
            results.len(),
            summary.processed,
            summary.reused,
            summary.failed,
            summary.mean_tempo
        );
        self.monitor.log_phase("Batch finished");

        Ok(BatchOutcome {
            results,
            errors,
            summary,
        })
    }

    async fn acquire_all(&self, titles: &[String]) -> Vec<Option<Acquisition>> {
        if titles.is_empty() {
            return Vec::new();
        }

        let pool = WorkerPool::new("acquire", self.settings.acquire_workers);
        tracing::info!(
            "⬇️ Acquiring {} tracks ({} workers)",
            titles.len(),
            pool.limit()
        );
        self.emit(ProgressEvent::PhaseStarted {
            phase: Phase::Acquisition,
            total: titles.len(),
        });

        let queries: Vec<Query> = titles.iter().map(|title| Query::from_title(title)).collect();
        let acquirer = Arc::clone(&self.acquirer);
        let work = move |query: Query| {
            let acquirer = Arc::clone(&acquirer);
            async move { Some(acquirer.acquire(&query).await) }
        };

        let total = titles.len();
        let mut completed = 0;
        pool.run(queries, work, |index, acquisition| {
            completed += 1;
            self.emit(ProgressEvent::ItemFinished {
                phase: Phase::Acquisition,
                title: titles[index].clone(),
                succeeded: acquisition.is_some_and(|a| a.local_path.is_some()),
                completed,
                total,
            });
        })
        .await
    }

    async fn estimate_all(&self, survivors: &[(String, Acquisition, PathBuf)]) -> Vec<Option<f64>> {
        if survivors.is_empty() {
            return Vec::new();
        }

        let pool = WorkerPool::new("estimate", self.settings.estimate_workers);
        tracing::info!(
            "🎵 Estimating BPM for {} tracks ({} workers)",
            survivors.len(),
            pool.limit()
        );
        self.emit(ProgressEvent::PhaseStarted {
            phase: Phase::Estimation,
            total: survivors.len(),
        });

        let paths: Vec<PathBuf> = survivors.iter().map(|(_, _, path)| path.clone()).collect();
        let estimator = Arc::clone(&self.estimator);
        let work = move |path: PathBuf| {
            let estimator = Arc::clone(&estimator);
            async move {
                match estimator.estimate(&path).await.map(round_tempo) {
                    Some(tempo) if tempo.is_finite() && tempo >= 0.0 => Some(tempo),
                    Some(tempo) => {
                        tracing::warn!("⚠️ Discarding invalid tempo {} for {}", tempo, path.display());
                        None
                    }
                    None => None,
                }
            }
        };

        let total = survivors.len();
        let mut completed = 0;
        pool.run(paths, work, |index, tempo| {
            completed += 1;
            self.emit(ProgressEvent::ItemFinished {
                phase: Phase::Estimation,
                title: survivors[index].0.clone(),
                succeeded: tempo.is_some(),
                completed,
                total,
            });
        })
        .await
    }
}

/// 重複的請求只算一次
fn distinct(titles: &[String]) -> usize {
    titles.iter().collect::<HashSet<_>>().len()
}

fn failure(title: &str, stage: FailureStage, reason: String) -> ItemFailure {
    ItemFailure {
        imported_title: title.to_string(),
        stage,
        reason,
    }
}
