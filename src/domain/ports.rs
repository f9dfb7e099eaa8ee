use crate::domain::model::{Acquisition, Query, ResultSet};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// 持久化的結果集合
pub trait ResultStore: Send + Sync {
    /// 不存在、空白或損毀時回傳空集合（損毀只記錄日誌）
    fn load(&self) -> impl std::future::Future<Output = ResultSet> + Send;
    /// 整份覆寫；失敗時先前的內容必須維持不變
    fn replace(&self, results: &ResultSet) -> impl std::future::Future<Output = Result<()>> + Send;
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 取得音訊的外部協作者；失敗以欄位缺席表示，不會回傳錯誤
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(&self, query: &Query) -> Acquisition;
}

/// 估計本地音訊檔的 BPM；失敗回傳 `None`
#[async_trait]
pub trait TempoEstimator: Send + Sync {
    async fn estimate(&self, audio_file: &Path) -> Option<f64>;
}

pub trait ConfigProvider: Send + Sync {
    fn store_path(&self) -> &str;
    fn work_dir(&self) -> &str;
    fn audio_extension(&self) -> &str;
    fn acquire_workers(&self) -> usize;
    fn estimate_workers(&self) -> usize;
}
