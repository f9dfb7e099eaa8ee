// Adapters layer: concrete implementations of the domain ports (storage, external tools).

pub mod command_estimator;
pub mod json_store;
pub mod memory_store;
pub mod ytdlp;

pub use command_estimator::{CommandEstimatorSettings, CommandTempoEstimator};
pub use json_store::JsonFileStore;
pub use memory_store::MemoryStore;
pub use ytdlp::{YtDlpAcquirer, YtDlpSettings};
