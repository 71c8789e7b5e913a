//! Error types for guide assembly and loading

use guide_core::{GuideCoreError, ShowId};

/// Result type for guide operations
pub type Result<T> = std::result::Result<T, GuideError>;

/// Error types for guide operations
#[derive(thiserror::Error, Debug)]
pub enum GuideError {
    #[error("Source fetch failed for show {show_id}: {message}")]
    Source { show_id: ShowId, message: String },

    #[error("Show {0} is not tracked")]
    UnknownShow(ShowId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] GuideCoreError),
}

impl GuideError {
    pub fn fetch_failed(show_id: ShowId, message: impl Into<String>) -> Self {
        GuideError::Source {
            show_id,
            message: message.into(),
        }
    }
}
