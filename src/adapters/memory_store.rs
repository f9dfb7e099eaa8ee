use crate::domain::model::ResultSet;
use crate::domain::ports::ResultStore;
use crate::utils::error::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 記憶體內的結果儲存，clone 之間共享同一份內容
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    results: Arc<Mutex<ResultSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: ResultSet) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
        }
    }

    pub async fn snapshot(&self) -> ResultSet {
        self.results.lock().await.clone()
    }
}

impl ResultStore for MemoryStore {
    async fn load(&self) -> ResultSet {
        self.results.lock().await.clone()
    }

    async fn replace(&self, results: &ResultSet) -> Result<()> {
        *self.results.lock().await = results.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.results.lock().await = ResultSet::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ResultRecord;

    #[test]
    fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        let results = ResultSet::new(vec![ResultRecord {
            resolved_title: "Song A".to_string(),
            imported_title: "Song A".to_string(),
            source_url: "https://example.com/a".to_string(),
            source_id: "a".to_string(),
            tempo: 120.0,
        }]);

        tokio_test::block_on(async {
            store.replace(&results).await.unwrap();
            assert_eq!(other.load().await, results);

            other.clear().await.unwrap();
            assert!(store.snapshot().await.is_empty());
        });
    }
}
