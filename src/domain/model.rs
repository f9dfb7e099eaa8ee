use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 一筆成功處理（或沿用）的結果；持久化欄位名稱沿用既有的 `bpm_results.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "title")]
    pub resolved_title: String,
    pub imported_title: String,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(alias = "video_id")]
    pub source_id: String,
    #[serde(rename = "bpm")]
    pub tempo: f64,
}

impl ResultRecord {
    pub fn new(imported_title: String, acquisition: &Acquisition, tempo: f64) -> Self {
        let source_id = acquisition.source_id.clone().unwrap_or_default();
        let resolved_title = acquisition
            .title
            .clone()
            .unwrap_or_else(|| source_id.clone());

        Self {
            resolved_title,
            imported_title,
            source_url: acquisition.source_url.clone().unwrap_or_default(),
            source_id,
            tempo: round_tempo(tempo),
        }
    }
}

/// BPM 一律保留兩位小數；放大後溢位的極大值維持原值
pub fn round_tempo(tempo: f64) -> f64 {
    let scaled = tempo * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        tempo
    }
}

/// 有序的結果集合，整份讀入、整份寫回
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<ResultRecord>,
}

impl ResultSet {
    pub fn new(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, imported_title: &str) -> Option<&ResultRecord> {
        self.records
            .iter()
            .find(|record| record.imported_title == imported_title)
    }

    pub fn contains(&self, imported_title: &str) -> bool {
        self.find(imported_title).is_some()
    }

    /// 空集合的平均值定義為 0
    pub fn mean_tempo(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let total: f64 = self.records.iter().map(|record| record.tempo).sum();
        total / self.records.len() as f64
    }

    /// 與另一個集合比較內容，不在意順序
    pub fn same_records(&self, other: &ResultSet) -> bool {
        self.len() == other.len()
            && self
                .records
                .iter()
                .all(|record| other.find(&record.imported_title) == Some(record))
    }
}

/// 解析批次輸入：一行一筆，去除前後空白並忽略空行
pub fn parse_batch_request(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    /// 已經是直接可下載的來源（http/https 連結），不需要搜尋
    pub is_direct: bool,
}

impl Query {
    pub fn from_title(title: &str) -> Self {
        let is_direct = url::Url::parse(title)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);

        Self {
            text: title.to_string(),
            is_direct,
        }
    }
}

/// Acquirer 的輸出；任何欄位缺席都代表取得失敗或資訊不完整
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acquisition {
    pub local_path: Option<PathBuf>,
    pub source_url: Option<String>,
    pub source_id: Option<String>,
    pub title: Option<String>,
}

impl Acquisition {
    pub fn absent() -> Self {
        Self::default()
    }

    /// 只有本地檔案確實存在時才算可用
    pub fn usable_path(&self) -> Option<&PathBuf> {
        self.local_path.as_ref().filter(|path| path.is_file())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStage {
    Acquisition,
    Estimation,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Acquisition => write!(f, "Acquisition"),
            FailureStage::Estimation => write!(f, "BPM calculation"),
        }
    }
}

/// 單筆失敗通知，不影響整批
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub imported_title: String,
    pub stage: FailureStage,
    pub reason: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for {} ({})",
            self.stage, self.imported_title, self.reason
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub requested: usize,
    pub reused: usize,
    pub processed: usize,
    pub failed: usize,
    pub mean_tempo: f64,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

/// 一次批次的完整結果：合併後的集合、錯誤清單與統計
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: ResultSet,
    pub errors: Vec<ItemFailure>,
    pub summary: BatchSummary,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, tempo: f64) -> ResultRecord {
        ResultRecord {
            resolved_title: format!("{} (Official Audio)", title),
            imported_title: title.to_string(),
            source_url: format!("https://www.youtube.com/watch?v={}", title.len()),
            source_id: title.to_lowercase().replace(' ', "_"),
            tempo,
        }
    }

    #[test]
    fn test_mean_tempo_of_empty_set_is_zero() {
        assert_eq!(ResultSet::default().mean_tempo(), 0.0);
    }

    #[test]
    fn test_mean_tempo() {
        let set = ResultSet::new(vec![record("Song A", 120.0), record("Song B", 140.0)]);
        assert!((set.mean_tempo() - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_tempo_two_decimals() {
        assert_eq!(round_tempo(123.456), 123.46);
        assert_eq!(round_tempo(95.5), 95.5);
    }

    #[test]
    fn test_round_tempo_keeps_huge_values_finite() {
        assert_eq!(round_tempo(1e307), 1e307);
        assert!(round_tempo(f64::MAX).is_finite());
    }

    #[test]
    fn test_parse_batch_request_skips_blank_lines() {
        let titles = parse_batch_request("Song A\n\n   \n  Song B  \r\nSong A\n");
        assert_eq!(titles, vec!["Song A", "Song B", "Song A"]);
    }

    #[test]
    fn test_query_detects_direct_urls() {
        assert!(Query::from_title("https://www.youtube.com/watch?v=abc").is_direct);
        assert!(!Query::from_title("Daft Punk - Around the World").is_direct);
        assert!(!Query::from_title("ftp://example.com/song.mp3").is_direct);
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(record("Song A", 95.5)).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["title", "imported_title", "url", "source_id", "bpm"] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_legacy_video_id_field_is_accepted() {
        let json = r#"{"title":"abc","imported_title":"Song A","url":"https://x","video_id":"abc","bpm":95.5}"#;
        let parsed: ResultRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.source_id, "abc");
        assert_eq!(parsed.tempo, 95.5);
    }

    #[test]
    fn test_same_records_ignores_order() {
        let a = ResultSet::new(vec![record("Song A", 1.0), record("Song B", 2.0)]);
        let b = ResultSet::new(vec![record("Song B", 2.0), record("Song A", 1.0)]);
        assert!(a.same_records(&b));
    }

    #[test]
    fn test_item_failure_mentions_title() {
        let failure = ItemFailure {
            imported_title: "Song C".to_string(),
            stage: FailureStage::Acquisition,
            reason: "no usable audio".to_string(),
        };
        assert!(failure.to_string().contains("Song C"));
    }
}
