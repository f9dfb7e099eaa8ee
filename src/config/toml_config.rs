use crate::adapters::command_estimator::{CommandEstimatorSettings, FILE_PLACEHOLDER};
use crate::adapters::ytdlp::YtDlpSettings;
use crate::core::batch::BatchSettings;
use crate::core::pool::default_worker_limit;
use crate::core::ConfigProvider;
use crate::utils::error::{BpmError, Result};
use crate::utils::validation::{
    validate_extension, validate_non_empty_string, validate_path, validate_positive_number,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static env regex is valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub store: StoreConfig,
    pub workers: WorkersConfig,
    pub acquire: AcquireConfig,
    pub estimate: EstimateConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub errors_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "bpm_results.json".to_string(),
            errors_path: "bpm_errors.txt".to_string(),
        }
    }
}

/// 未設定時兩個階段都使用 `default_worker_limit()`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub acquire: Option<usize>,
    pub estimate: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub program: String,
    pub work_dir: String,
    pub audio_format: String,
    pub timeout_seconds: Option<u64>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        let defaults = YtDlpSettings::default();
        Self {
            program: defaults.program,
            work_dir: ".".to_string(),
            audio_format: defaults.audio_format,
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        let defaults = CommandEstimatorSettings::default();
        Self {
            program: defaults.program,
            args: defaults.args,
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| BpmError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BPM_WORK_DIR})，未定義的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn errors_path(&self) -> &str {
        &self.store.errors_path
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }

    pub fn acquirer_settings(&self) -> YtDlpSettings {
        YtDlpSettings {
            program: self.acquire.program.clone(),
            work_dir: PathBuf::from(&self.acquire.work_dir),
            audio_format: self.acquire.audio_format.clone(),
            timeout: self.acquire.timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn estimator_settings(&self) -> CommandEstimatorSettings {
        CommandEstimatorSettings {
            program: self.estimate.program.clone(),
            args: self.estimate.args.clone(),
            timeout: self.estimate.timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings::from_config(self)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("store.path", &self.store.path)?;
        validate_path("store.errors_path", &self.store.errors_path)?;
        validate_path("acquire.work_dir", &self.acquire.work_dir)?;
        validate_non_empty_string("acquire.program", &self.acquire.program)?;
        validate_extension("acquire.audio_format", &self.acquire.audio_format)?;
        validate_non_empty_string("estimate.program", &self.estimate.program)?;

        if let Some(workers) = self.workers.acquire {
            validate_positive_number("workers.acquire", workers, 1)?;
        }
        if let Some(workers) = self.workers.estimate {
            validate_positive_number("workers.estimate", workers, 1)?;
        }

        if !self.estimate.args.iter().any(|arg| arg.contains(FILE_PLACEHOLDER)) {
            return Err(BpmError::ConfigValidationError {
                field: "estimate.args".to_string(),
                message: format!("at least one argument must contain {}", FILE_PLACEHOLDER),
            });
        }

        if self.store.path == self.store.errors_path {
            return Err(BpmError::ConfigValidationError {
                field: "store.errors_path".to_string(),
                message: "must differ from store.path".to_string(),
            });
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn store_path(&self) -> &str {
        &self.store.path
    }

    fn work_dir(&self) -> &str {
        &self.acquire.work_dir
    }

    fn audio_extension(&self) -> &str {
        &self.acquire.audio_format
    }

    fn acquire_workers(&self) -> usize {
        self.workers.acquire.unwrap_or_else(default_worker_limit)
    }

    fn estimate_workers(&self) -> usize {
        self.workers.estimate.unwrap_or_else(default_worker_limit)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();

        assert_eq!(config.store_path(), "bpm_results.json");
        assert_eq!(config.errors_path(), "bpm_errors.txt");
        assert_eq!(config.audio_extension(), "mp3");
        assert_eq!(config.acquire_workers(), default_worker_limit());
        assert_eq!(config.estimate_workers(), default_worker_limit());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[store]
path = "cache/results.json"

[workers]
acquire = 8
estimate = 2

[acquire]
work_dir = "/tmp/bpm"
timeout_seconds = 300

[estimate]
program = "bpm-tool"
args = ["--file", "{file}"]

[monitoring]
enabled = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.store_path(), "cache/results.json");
        assert_eq!(config.errors_path(), "bpm_errors.txt");
        assert_eq!(config.acquire_workers(), 8);
        assert_eq!(config.estimate_workers(), 2);
        assert_eq!(config.acquirer_settings().timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.estimator_settings().program, "bpm-tool");
        assert!(config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("BPM_BATCH_TEST_WORK_DIR", "/var/tmp/bpm");

        let toml_content = r#"
[acquire]
work_dir = "${BPM_BATCH_TEST_WORK_DIR}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.work_dir(), "/var/tmp/bpm");

        std::env::remove_var("BPM_BATCH_TEST_WORK_DIR");
    }

    #[test]
    fn test_config_validation() {
        let zero_workers = TomlConfig::from_toml_str("[workers]\nacquire = 0\n").unwrap();
        assert!(zero_workers.validate().is_err());

        let no_placeholder =
            TomlConfig::from_toml_str("[estimate]\nargs = [\"tempo\"]\n").unwrap();
        assert!(no_placeholder.validate().is_err());

        let bad_format = TomlConfig::from_toml_str("[acquire]\naudio_format = \".mp3\"\n").unwrap();
        assert!(bad_format.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("[workers\nacquire = 1").unwrap_err();
        assert!(matches!(err, BpmError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[store]\npath = \"from-file.json\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.store_path(), "from-file.json");
    }
}
