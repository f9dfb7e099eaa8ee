use bpm_batch::config::cli::BatchInput;
use bpm_batch::core::ConfigProvider;
use bpm_batch::utils::error::ErrorSeverity;
use bpm_batch::utils::{logger, validation::Validate};
use bpm_batch::{
    BatchOrchestrator, BpmError, CliConfig, CommandTempoEstimator, JsonFileStore, Phase,
    ProgressEvent, TomlConfig, YtDlpAcquirer,
};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

type Orchestrator = BatchOrchestrator<JsonFileStore, YtDlpAcquirer, CommandTempoEstimator>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else if let Err(e) = logger::init_cli_logger(cli.verbose, cli.log_file.as_deref().map(Path::new)) {
        eprintln!("❌ Failed to open log file: {}", e);
        std::process::exit(1);
    }

    tracing::info!("🚀 Starting bpm-batch");

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    if cli.verbose {
        tracing::debug!("Resolved config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        exit_with(&e);
    }

    let store = JsonFileStore::new(config.store_path());
    let acquirer = Arc::new(YtDlpAcquirer::new(config.acquirer_settings()));
    let estimator = Arc::new(CommandTempoEstimator::new(config.estimator_settings()));
    let orchestrator = BatchOrchestrator::new(store, acquirer, estimator, config.batch_settings())
        .with_monitoring(config.monitoring_enabled());

    let result = match &cli.command {
        bpm_batch::config::Command::Run { input, .. } => {
            run_batch(orchestrator, input, &config).await
        }
        bpm_batch::config::Command::Status { input } => show_status(&orchestrator, input).await,
        bpm_batch::config::Command::Clear => orchestrator.clear_results().await.map(|_| {
            println!("🗑️ Results cleared: {}", config.store_path());
        }),
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ bpm-batch failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        exit_with(&e);
    }

    Ok(())
}

async fn run_batch(
    orchestrator: Orchestrator,
    input: &BatchInput,
    config: &TomlConfig,
) -> bpm_batch::Result<()> {
    let titles = input.read_titles()?;
    if titles.is_empty() {
        tracing::warn!("📭 No titles given; nothing to do");
        return Ok(());
    }
    println!("Items Mapped: {}", titles.len());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = Arc::new(orchestrator.with_progress(tx));
    let handle = orchestrator.spawn(titles);
    // 只剩背景 task 持有 sender，批次結束後通道自然關閉
    drop(orchestrator);

    while let Some(event) = rx.recv().await {
        report_progress(&event);
    }

    let outcome = handle.wait().await?;

    for (index, record) in outcome.results.records().iter().enumerate() {
        println!(
            "[{}] - {:.2}  {} ({})",
            index + 1,
            record.tempo,
            record.imported_title,
            record.resolved_title
        );
    }
    println!("Average BPM: {:.2}", outcome.summary.mean_tempo);
    println!("Items Processed: {}", outcome.results.len());
    println!(
        "Elapsed time: {:.2} seconds",
        outcome.summary.elapsed.as_secs_f64()
    );

    if !outcome.errors.is_empty() {
        let notices: String = outcome
            .errors
            .iter()
            .map(|failure| format!("{}\n", failure))
            .collect();
        std::fs::write(config.errors_path(), notices)?;
        eprintln!(
            "⚠️ {} items failed; see {}",
            outcome.errors.len(),
            config.errors_path()
        );
    }

    Ok(())
}

async fn show_status(orchestrator: &Orchestrator, input: &BatchInput) -> bpm_batch::Result<()> {
    let titles = input.read_titles()?;
    let known = orchestrator.known_titles(&titles).await;

    for (title, stored) in &known {
        let marker = if *stored { "✅" } else { "❌" };
        println!("{} {}", marker, title);
    }

    let stored = known.iter().filter(|(_, stored)| *stored).count();
    println!("{} of {} titles have stored results", stored, known.len());
    Ok(())
}

fn report_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::PhaseStarted { phase, total } => {
            let label = match phase {
                Phase::Acquisition => "⬇️ Downloading",
                Phase::Estimation => "🎵 Calculating BPM for",
            };
            tracing::info!("{} {} tracks", label, total);
        }
        ProgressEvent::ItemFinished {
            title,
            succeeded,
            completed,
            total,
            ..
        } => {
            let marker = if *succeeded { "✔" } else { "✘" };
            tracing::info!("[{}/{}] {} {}", completed, total, marker, title);
        }
        ProgressEvent::Committed { records } => {
            tracing::info!("💾 Saved {} results", records);
        }
        ProgressEvent::CleanedUp { removed } => {
            tracing::debug!("🧹 Removed {} downloaded files", removed);
        }
    }
}

fn exit_with(e: &BpmError) -> ! {
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
