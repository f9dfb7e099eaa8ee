use crate::domain::model::{Acquisition, Query};
use crate::domain::ports::Acquirer;
use crate::utils::error::{BpmError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\\/*?:"<>|]"#).expect("static filename regex is valid")
});

/// 移除檔名中不合法的字元
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_FILENAME_CHARS.replace_all(name, "").into_owned()
}

/// `yt-dlp --print-json` 輸出中用得到的欄位
#[derive(Debug, Deserialize)]
struct VideoInfo {
    id: String,
    title: Option<String>,
    webpage_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YtDlpSettings {
    pub program: String,
    pub work_dir: PathBuf,
    pub audio_format: String,
    pub timeout: Option<Duration>,
}

impl Default for YtDlpSettings {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            work_dir: PathBuf::from("."),
            audio_format: "mp3".to_string(),
            timeout: None,
        }
    }
}

/// 以 `yt-dlp` 下載並轉檔；檔名取自來源 id，並行下載不會互相覆寫
#[derive(Debug, Clone)]
pub struct YtDlpAcquirer {
    settings: YtDlpSettings,
}

impl YtDlpAcquirer {
    pub fn new(settings: YtDlpSettings) -> Self {
        Self { settings }
    }

    fn search_term(query: &Query) -> String {
        if query.is_direct {
            query.text.clone()
        } else {
            format!("ytsearch:{}", query.text)
        }
    }

    fn build_command(&self, query: &Query) -> Command {
        let output_template = self.settings.work_dir.join("%(id)s.%(ext)s");
        let mut command = Command::new(&self.settings.program);
        command
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(&self.settings.audio_format)
            .arg("-f")
            .arg("bestaudio/best")
            .arg("--no-playlist")
            .arg("--output")
            .arg(output_template)
            .arg("--print-json")
            .arg(Self::search_term(query))
            .kill_on_drop(true);
        command
    }

    fn parse_output(&self, stdout: &[u8]) -> Result<Acquisition> {
        // ytsearch 可能輸出多行，取第一筆結果
        let line = stdout
            .split(|b| *b == b'\n')
            .find(|line| !line.iter().all(u8::is_ascii_whitespace))
            .ok_or_else(|| BpmError::ToolError {
                program: self.settings.program.clone(),
                message: "no output".to_string(),
            })?;
        let info: VideoInfo = serde_json::from_slice(line)?;

        let file_name = format!(
            "{}.{}",
            sanitize_filename(&info.id),
            self.settings.audio_format
        );

        Ok(Acquisition {
            local_path: Some(self.settings.work_dir.join(file_name)),
            source_url: info.webpage_url,
            source_id: Some(info.id),
            title: info.title,
        })
    }

    async fn download(&self, query: &Query) -> Result<Acquisition> {
        let program = self.settings.program.clone();
        let mut command = self.build_command(query);
        let pending = command.output();

        let output = match self.settings.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| BpmError::AcquisitionError {
                    query: query.text.clone(),
                    message: format!("timed out after {:?}", limit),
                })?,
            None => pending.await,
        }
        .map_err(|e| BpmError::ToolError {
            program: program.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BpmError::AcquisitionError {
                query: query.text.clone(),
                message: format!("{} exited with {}: {}", program, output.status, stderr.trim()),
            });
        }

        self.parse_output(&output.stdout)
    }
}

#[async_trait]
impl Acquirer for YtDlpAcquirer {
    async fn acquire(&self, query: &Query) -> Acquisition {
        tracing::debug!("⬇️ Downloading '{}'", query.text);
        match self.download(query).await {
            Ok(acquisition) => {
                if let Some(path) = &acquisition.local_path {
                    tracing::debug!("Downloaded '{}' to {}", query.text, path.display());
                }
                acquisition
            }
            Err(e) => {
                tracing::error!("❌ Error downloading '{}': {}", query.text, e);
                Acquisition::absent()
            }
        }
    }
}
