/// Tally Guide
///
/// Release-pattern classification, next-season prediction and a chunked,
/// date-indexed viewing guide for streaming shows.

pub mod chunks;
pub mod config;
pub mod error;
pub mod guide;
pub mod pattern;
pub mod savings;
pub mod session;
pub mod source;
pub mod window;

// Re-export main types for easy access
pub use crate::chunks::{ChunkFetcher, ChunkLoadError, ChunkLoader, ChunkState, GuideChunk, LoadOutcome, Viewport};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{GuideError, Result};
pub use crate::guide::{assemble_guide, BillingCalendar, DateIndex, DateIndexEntry, DayBadges, GuideShow, MonthCache};
pub use crate::pattern::{classify, predict_next_release, ReleasePattern, ReleasePatternResult};
pub use crate::savings::{estimate_savings, SavingsEstimate, SubscriptionWindow};
pub use crate::session::{GuideBuild, GuideSession};
pub use crate::source::{collect_shows, CollectedShows, EpisodeSource, FixtureSource, GuideFixture};
pub use crate::window::{build_window, viewing_window, SeasonSchedule, ViewingWindow};

pub use guide_core;
