pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::{CommandTempoEstimator, JsonFileStore, MemoryStore, YtDlpAcquirer};
pub use core::batch::{BatchOrchestrator, BatchSettings, Phase, ProgressEvent};
pub use core::task::{BatchHandle, BatchState};
pub use domain::model::{BatchOutcome, ItemFailure, ResultRecord, ResultSet};
pub use utils::error::{BpmError, Result};
