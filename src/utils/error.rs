use thiserror::Error;

#[derive(Error, Debug)]
pub enum BpmError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to commit results to {path}: {message}")]
    StoreWriteError { path: String, message: String },

    #[error("External tool '{program}' failed: {message}")]
    ToolError { program: String, message: String },

    #[error("Acquisition failed for '{query}': {message}")]
    AcquisitionError { query: String, message: String },

    #[error("Tempo estimation failed for {path}: {message}")]
    EstimationError { path: String, message: String },

    #[error("Batch task error: {message}")]
    TaskError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    ExternalTool,
    Item,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BpmError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BpmError::ConfigValidationError { .. } | BpmError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            BpmError::IoError(_)
            | BpmError::SerializationError(_)
            | BpmError::StoreWriteError { .. } => ErrorCategory::Storage,
            BpmError::ToolError { .. } => ErrorCategory::ExternalTool,
            BpmError::AcquisitionError { .. } | BpmError::EstimationError { .. } => {
                ErrorCategory::Item
            }
            BpmError::TaskError { .. } => ErrorCategory::Runtime,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 單筆失敗不會中斷整批
            ErrorCategory::Item => ErrorSeverity::Low,
            ErrorCategory::ExternalTool => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::High,
            ErrorCategory::Runtime => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            BpmError::ConfigValidationError { .. } => {
                "Check the configuration file and command line flags".to_string()
            }
            BpmError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value of '{}' and try again", field)
            }
            BpmError::StoreWriteError { path, .. } => format!(
                "Make sure {} is writable; the previous results were left untouched",
                path
            ),
            BpmError::IoError(_) => "Check file permissions and free disk space".to_string(),
            BpmError::SerializationError(_) => {
                "The results file may be damaged; run `clear` to reset it".to_string()
            }
            BpmError::ToolError { program, .. } => {
                format!("Make sure '{}' is installed and on PATH", program)
            }
            BpmError::AcquisitionError { .. } => {
                "Try a more specific title or a direct URL".to_string()
            }
            BpmError::EstimationError { .. } => {
                "The downloaded audio may be empty or unreadable".to_string()
            }
            BpmError::TaskError { .. } => "Re-run the batch".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Storage => format!("Could not save results: {}", self),
            ErrorCategory::ExternalTool => format!("External tool problem: {}", self),
            ErrorCategory::Item => format!("Track skipped: {}", self),
            ErrorCategory::Runtime => format!("Batch aborted: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BpmError>;
