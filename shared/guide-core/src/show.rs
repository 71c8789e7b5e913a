//! Per-user show tracking settings

use crate::{BufferDays, ShowId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How the user is following a show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    #[default]
    Watching,
    PlanToWatch,
    Paused,
    Completed,
    Dropped,
}

impl WatchStatus {
    /// Completed and dropped shows are kept for history only
    pub fn is_actively_followed(&self) -> bool {
        !matches!(self, WatchStatus::Completed | WatchStatus::Dropped)
    }
}

/// A show the user tracks, with the per-show settings the guide needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedShow {
    pub show_id: ShowId,

    pub title: String,

    /// Season the guide follows
    #[serde(default = "default_season")]
    pub season: u32,

    /// Raw user setting; clamped into `[0, 30]` wherever it is used
    #[serde(default)]
    pub buffer_days: i64,

    #[serde(default)]
    pub watch_status: WatchStatus,

    /// Fallback when no season schedule is known
    #[serde(default)]
    pub next_episode_date: Option<NaiveDate>,
}

fn default_season() -> u32 {
    1
}

impl TrackedShow {
    pub fn new(show_id: ShowId, title: impl Into<String>, season: u32) -> Self {
        Self {
            show_id,
            title: title.into(),
            season,
            buffer_days: 0,
            watch_status: WatchStatus::Watching,
            next_episode_date: None,
        }
    }

    pub fn with_buffer_days(mut self, raw: i64) -> Self {
        self.buffer_days = raw;
        self
    }

    pub fn with_status(mut self, status: WatchStatus) -> Self {
        self.watch_status = status;
        self
    }

    pub fn with_next_episode_date(mut self, date: NaiveDate) -> Self {
        self.next_episode_date = Some(date);
        self
    }

    pub fn buffer(&self) -> BufferDays {
        BufferDays::clamped(self.buffer_days)
    }
}
