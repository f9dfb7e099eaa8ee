use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

/// 清除工作目錄中批次產生的暫存音訊檔
#[derive(Debug, Clone)]
pub struct Cleanup {
    work_dir: PathBuf,
    extension: String,
}

impl Cleanup {
    pub fn new(work_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            extension: extension.into(),
        }
    }

    fn is_transient(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }

    /// 可重複呼叫，永不失敗；單一檔案刪除失敗只記錄並跳過
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.work_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                tracing::error!(
                    "❌ Cannot list work directory {}: {}",
                    self.work_dir.display(),
                    e
                );
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("❌ Failed to read directory entry: {}", e);
                    report.failed += 1;
                    break;
                }
            };

            let path = entry.path();
            if !self.is_transient(&path) {
                continue;
            }
            match entry.file_type().await {
                Ok(kind) if kind.is_file() => {}
                _ => continue,
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!("🧹 Removed {}", path.display());
                    report.removed += 1;
                }
                Err(e) => {
                    tracing::error!("❌ Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweep_removes_only_audio_files() {
        let dir = TempDir::new().unwrap();
        for name in ["a1b2.mp3", "c3d4.MP3", "notes.txt", "bpm_results.json"] {
            tokio::fs::write(dir.path().join(name), b"data").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("folder.mp3")).await.unwrap();

        let cleanup = Cleanup::new(dir.path(), "mp3");
        let report = cleanup.sweep().await;

        assert_eq!(report, SweepReport { removed: 2, failed: 0 });
        assert!(!dir.path().join("a1b2.mp3").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("bpm_results.json").exists());
        assert!(dir.path().join("folder.mp3").is_dir());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("x.mp3"), b"data").await.unwrap();

        let cleanup = Cleanup::new(dir.path(), "mp3");
        assert_eq!(cleanup.sweep().await.removed, 1);
        assert_eq!(cleanup.sweep().await, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_missing_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        let cleanup = Cleanup::new(dir.path().join("does-not-exist"), "mp3");
        assert_eq!(cleanup.sweep().await, SweepReport::default());
    }
}
