use crate::config::toml_config::TomlConfig;
use crate::domain::model::parse_batch_request;
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};
use std::io::Read;

#[derive(Debug, Clone, Parser)]
#[command(name = "bpm-batch")]
#[command(about = "Download tracks and estimate their BPM, caching results between runs")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Results file (overrides store.path)
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Directory for downloaded audio (overrides acquire.work_dir)
    #[arg(long, global = true)]
    pub work_dir: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    /// Append error-level events to this file
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Process a batch of titles or URLs
    Run {
        #[command(flatten)]
        input: BatchInput,

        #[arg(long)]
        acquire_workers: Option<usize>,

        #[arg(long)]
        estimate_workers: Option<usize>,

        /// Failure notices file (overrides store.errors_path)
        #[arg(long)]
        errors_file: Option<String>,

        /// Log process CPU and memory after each phase
        #[arg(long)]
        monitor: Option<bool>,
    },
    /// Show which titles already have a stored result
    Status {
        #[command(flatten)]
        input: BatchInput,
    },
    /// Reset the stored results to empty
    Clear,
}

#[derive(Debug, Clone, Args)]
pub struct BatchInput {
    /// Text file with one title or URL per line ("-" reads stdin)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Titles or URLs given directly
    pub titles: Vec<String>,
}

impl BatchInput {
    pub fn read_titles(&self) -> Result<Vec<String>> {
        let mut titles = Vec::new();

        if let Some(path) = &self.input {
            let content = if path == "-" {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                std::fs::read_to_string(path)?
            };
            titles.extend(parse_batch_request(&content));
        }

        titles.extend(parse_batch_request(&self.titles.join("\n")));
        Ok(titles)
    }
}

impl CliConfig {
    /// 載入 TOML（若有）並套用命令列覆蓋設定
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(store) = &self.store {
            config.store.path = store.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            config.acquire.work_dir = work_dir.clone();
        }

        if let Command::Run {
            acquire_workers,
            estimate_workers,
            errors_file,
            monitor,
            ..
        } = &self.command
        {
            if acquire_workers.is_some() {
                config.workers.acquire = *acquire_workers;
            }
            if estimate_workers.is_some() {
                config.workers.estimate = *estimate_workers;
            }
            if let Some(errors_file) = errors_file {
                config.store.errors_path = errors_file.clone();
            }
            if let Some(monitor) = monitor {
                config.monitoring.enabled = *monitor;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigProvider;

    #[test]
    fn test_run_overrides() {
        let cli = CliConfig::parse_from([
            "bpm-batch",
            "--store",
            "custom.json",
            "run",
            "--acquire-workers",
            "1",
            "--estimate-workers",
            "3",
            "Song A",
            "Song B",
        ]);

        let config = cli.resolve().unwrap();
        assert_eq!(config.store_path(), "custom.json");
        assert_eq!(config.acquire_workers(), 1);
        assert_eq!(config.estimate_workers(), 3);
    }

    #[test]
    fn test_titles_from_args_and_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let list = dir.path().join("music_list.txt");
        std::fs::write(&list, "Song A\n\n  Song B\n").unwrap();

        let cli = CliConfig::parse_from([
            "bpm-batch",
            "status",
            "--input",
            list.to_str().unwrap(),
            "Song C",
        ]);

        let Command::Status { input } = &cli.command else {
            panic!("expected status command");
        };
        assert_eq!(input.read_titles().unwrap(), vec!["Song A", "Song B", "Song C"]);
    }

    #[test]
    fn test_clear_takes_no_titles() {
        let cli = CliConfig::parse_from(["bpm-batch", "clear"]);
        assert!(matches!(cli.command, Command::Clear));
    }
}
