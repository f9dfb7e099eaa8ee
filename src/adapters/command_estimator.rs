use crate::domain::ports::TempoEstimator;
use crate::utils::error::{BpmError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static number regex is valid"));

/// 參數中的此佔位符會被替換成音訊檔路徑
pub const FILE_PLACEHOLDER: &str = "{file}";

#[derive(Debug, Clone)]
pub struct CommandEstimatorSettings {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl Default for CommandEstimatorSettings {
    fn default() -> Self {
        Self {
            program: "aubio".to_string(),
            args: vec![
                "tempo".to_string(),
                "-i".to_string(),
                FILE_PLACEHOLDER.to_string(),
            ],
            timeout: None,
        }
    }
}

/// 呼叫外部分析程式估計 BPM，取 stdout 中的第一個數字
#[derive(Debug, Clone)]
pub struct CommandTempoEstimator {
    settings: CommandEstimatorSettings,
}

impl CommandTempoEstimator {
    pub fn new(settings: CommandEstimatorSettings) -> Self {
        Self { settings }
    }

    fn build_args(&self, audio_file: &Path) -> Vec<String> {
        let file = audio_file.display().to_string();
        self.settings
            .args
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, &file))
            .collect()
    }

    fn parse_tempo(stdout: &str) -> Option<f64> {
        FIRST_NUMBER
            .find(stdout)
            .and_then(|m| m.as_str().parse::<f64>().ok())
    }

    async fn run(&self, audio_file: &Path) -> Result<f64> {
        let error = |message: String| BpmError::EstimationError {
            path: audio_file.display().to_string(),
            message,
        };

        if !audio_file.is_file() {
            return Err(error("file not found".to_string()));
        }

        let mut command = Command::new(&self.settings.program);
        command.args(self.build_args(audio_file)).kill_on_drop(true);
        let pending = command.output();

        let output = match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| error(format!("timed out after {:?}", limit)))?,
            None => pending.await,
        }
        .map_err(|e| BpmError::ToolError {
            program: self.settings.program.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(error(format!("exited with {}: {}", output.status, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_tempo(&stdout).ok_or_else(|| error("no tempo in analyzer output".to_string()))
    }
}

#[async_trait]
impl TempoEstimator for CommandTempoEstimator {
    async fn estimate(&self, audio_file: &Path) -> Option<f64> {
        match self.run(audio_file).await {
            Ok(tempo) => {
                tracing::debug!("🎵 {} → {:.2} BPM", audio_file.display(), tempo);
                Some(tempo)
            }
            Err(e) => {
                tracing::error!("❌ Error calculating BPM: {}", e);
                None
            }
        }
    }
}
