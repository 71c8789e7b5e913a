//! Guide assembly: billing calendar, the date-indexed guide and month caching

pub mod assembler;
pub mod billing;
pub mod cache;

pub use assembler::{
    assemble_guide, DateIndex, DateIndexEntry, DayBadges, GuideEpisode, GuideShow, MAX_LOGOS,
    MAX_PIPS,
};
pub use billing::{is_resubscription_day, BillingCalendar, BillingDay};
pub use cache::{MonthCache, MonthCacheStats, MonthKey};
