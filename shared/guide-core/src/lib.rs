//! Guide Core - Shared data structures for episode schedules and viewing windows

pub mod ids;
pub mod episode;
pub mod provider;
pub mod dates;
pub mod show;

pub use ids::{RegionCode, ShowId};
pub use episode::{EpisodeKey, EpisodeRecord};
pub use provider::ProviderBadge;
pub use dates::{ActiveWindow, BufferDays, DateKey, DateRange};
pub use show::{TrackedShow, WatchStatus};

/// Result type for Guide Core operations
pub type Result<T> = std::result::Result<T, GuideCoreError>;

/// Error types for Guide Core operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GuideCoreError {
    #[error("Invalid region code: {0:?}")]
    InvalidRegion(String),

    #[error("Invalid date: {0:?}")]
    InvalidDate(String),
}
