pub mod batch;
pub mod cleanup;
pub mod partition;
pub mod pool;
pub mod task;

pub use crate::domain::model::{BatchOutcome, ResultRecord, ResultSet};
pub use crate::domain::ports::{Acquirer, ConfigProvider, ResultStore, TempoEstimator};
pub use crate::utils::error::Result;
