use crate::domain::model::{ResultRecord, ResultSet};
use std::collections::{HashMap, HashSet};

/// 依照既有結果把請求分成「沿用」與「需要處理」兩組，保留原始順序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub to_reuse: Vec<String>,
    pub to_process: Vec<String>,
}

pub fn partition(existing: &ResultSet, requested: &[String]) -> Partition {
    let known: HashSet<&str> = existing
        .records()
        .iter()
        .map(|record| record.imported_title.as_str())
        .collect();

    let (to_reuse, to_process) = requested
        .iter()
        .cloned()
        .partition(|title| known.contains(title.as_str()));

    Partition {
        to_reuse,
        to_process,
    }
}

/// 合併沿用與新產生的記錄。
///
/// 以請求順序走訪；同一個 imported title 只保留第一筆。
pub fn merge(
    requested: &[String],
    existing: &ResultSet,
    produced: Vec<ResultRecord>,
) -> ResultSet {
    let mut fresh: HashMap<String, ResultRecord> = HashMap::with_capacity(produced.len());
    for record in produced {
        fresh.entry(record.imported_title.clone()).or_insert(record);
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(requested.len());
    let mut merged = Vec::with_capacity(requested.len());

    for title in requested {
        if !seen.insert(title.as_str()) {
            continue;
        }
        if let Some(record) = existing.find(title) {
            merged.push(record.clone());
        } else if let Some(record) = fresh.remove(title) {
            merged.push(record);
        }
    }

    ResultSet::new(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, tempo: f64) -> ResultRecord {
        ResultRecord {
            resolved_title: title.to_string(),
            imported_title: title.to_string(),
            source_url: "https://example.com".to_string(),
            source_id: title.to_string(),
            tempo,
        }
    }

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_partition_splits_known_titles() {
        let existing = ResultSet::new(vec![record("Song A", 95.5)]);
        let result = partition(&existing, &titles(&["Song A", "Song B", "Song C"]));

        assert_eq!(result.to_reuse, titles(&["Song A"]));
        assert_eq!(result.to_process, titles(&["Song B", "Song C"]));
    }

    #[test]
    fn test_partition_is_exact_match() {
        let existing = ResultSet::new(vec![record("Song A", 95.5)]);
        let result = partition(&existing, &titles(&["song a", "Song A "]));

        assert!(result.to_reuse.is_empty());
        assert_eq!(result.to_process.len(), 2);
    }

    #[test]
    fn test_duplicates_are_processed_independently() {
        let result = partition(&ResultSet::default(), &titles(&["Song X", "Song X"]));
        assert_eq!(result.to_process, titles(&["Song X", "Song X"]));
    }

    #[test]
    fn test_merge_keeps_one_record_per_title() {
        let requested = titles(&["Song A", "Song B", "Song B"]);
        let existing = ResultSet::new(vec![record("Song A", 95.5)]);
        let produced = vec![record("Song B", 128.0), record("Song B", 127.0)];

        let merged = merge(&requested, &existing, produced);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.find("Song A").unwrap().tempo, 95.5);
        assert_eq!(merged.find("Song B").unwrap().tempo, 128.0);
    }

    #[test]
    fn test_merge_drops_unrequested_stored_records() {
        let existing = ResultSet::new(vec![record("Song A", 95.5), record("Old Song", 80.0)]);
        let merged = merge(&titles(&["Song A"]), &existing, Vec::new());

        assert_eq!(merged.len(), 1);
        assert!(!merged.contains("Old Song"));
    }
}
