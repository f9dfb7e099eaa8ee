use crate::domain::model::ResultSet;
use crate::domain::ports::ResultStore;
use crate::utils::error::{BpmError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// 以單一 JSON 檔保存結果（預設 `bpm_results.json`）
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ResultSet> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ResultSet::default()),
            Err(e) => return Err(e.into()),
        };

        // 清除結果後檔案可能是空的
        if content.trim().is_empty() {
            return Ok(ResultSet::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn commit_error(&self, message: impl ToString) -> BpmError {
        BpmError::StoreWriteError {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// 先寫入同目錄的暫存檔再 rename，讀取端不會看到寫到一半的內容
    fn write_atomic(&self, data: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.commit_error(e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.commit_error(e))?;
        temp.write_all(data).map_err(|e| self.commit_error(e))?;
        temp.as_file().sync_all().map_err(|e| self.commit_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.commit_error(e.error))?;

        Ok(())
    }
}

impl ResultStore for JsonFileStore {
    async fn load(&self) -> ResultSet {
        match self.read() {
            Ok(results) => {
                tracing::debug!(
                    "Loaded {} stored results from {}",
                    results.len(),
                    self.path.display()
                );
                results
            }
            Err(e) => {
                tracing::error!(
                    "❌ Failed to parse existing BPM data in {}, starting empty: {}",
                    self.path.display(),
                    e
                );
                ResultSet::default()
            }
        }
    }

    async fn replace(&self, results: &ResultSet) -> Result<()> {
        // JSON 沒有 inf/NaN，寫成 null 會讓整份檔案無法再讀回
        if let Some(record) = results.records().iter().find(|r| !r.tempo.is_finite()) {
            return Err(self.commit_error(format!(
                "non-finite tempo for '{}'",
                record.imported_title
            )));
        }

        let data = serde_json::to_vec_pretty(results)?;
        self.write_atomic(&data)?;
        tracing::debug!("💾 Wrote {} results to {}", results.len(), self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.write_atomic(b"[]")
    }
}
