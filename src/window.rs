/// Viewing window construction from season schedules
use crate::pattern::ReleasePatternResult;
use chrono::NaiveDate;
use guide_core::{ActiveWindow, BufferDays, EpisodeRecord, ShowId, TrackedShow, WatchStatus};
use serde::{Deserialize, Serialize};

/// The known air dates of a show's current season
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonSchedule {
    /// Air dates of dated episodes, in any order, duplicates allowed
    pub air_dates: Vec<NaiveDate>,

    /// Announced next episode, used when the season itself has no span
    pub next_episode_date: Option<NaiveDate>,
}

impl SeasonSchedule {
    pub fn from_episodes(episodes: &[EpisodeRecord], next_episode_date: Option<NaiveDate>) -> Self {
        Self {
            air_dates: episodes.iter().filter_map(|e| e.air_date).collect(),
            next_episode_date,
        }
    }

    /// Rebuild a schedule from classifier output (season start and end only)
    pub fn from_pattern(result: &ReleasePatternResult, next_episode_date: Option<NaiveDate>) -> Self {
        let air_dates = match (result.season_start, result.season_end) {
            (Some(start), Some(end)) if result.total_episodes >= 2 => vec![start, end],
            (Some(start), _) => vec![start],
            _ => Vec::new(),
        };
        Self {
            air_dates,
            next_episode_date,
        }
    }
}

/// Build the active window for a show.
///
/// A season with two or more dated episodes spans `min - buffer ..= max + buffer`.
/// Without such a span, a known next episode (or the single dated episode)
/// yields a one-day window. The buffer is deliberately not applied to that
/// one-day fallback.
pub fn build_window(schedule: &SeasonSchedule, buffer_days: i64) -> Option<ActiveWindow> {
    let buffer = BufferDays::clamped(buffer_days);

    if schedule.air_dates.len() >= 2 {
        let start = schedule.air_dates.iter().min()?;
        let end = schedule.air_dates.iter().max()?;
        return Some(ActiveWindow::new(*start, *end).extended(buffer));
    }

    schedule
        .next_episode_date
        .or_else(|| schedule.air_dates.first().copied())
        .map(ActiveWindow::single_day)
}

/// A show's window together with the tracking context callers filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewingWindow {
    pub show_id: ShowId,
    pub status: WatchStatus,
    pub window: ActiveWindow,
}

impl ViewingWindow {
    /// Completed and dropped shows keep their window for history only
    pub fn surface_for_resubscription(&self) -> bool {
        self.status.is_actively_followed()
    }
}

/// Window for a tracked show from its fetched episodes
pub fn viewing_window(show: &TrackedShow, episodes: &[EpisodeRecord]) -> Option<ViewingWindow> {
    let schedule = SeasonSchedule::from_episodes(episodes, show.next_episode_date);
    build_window(&schedule, show.buffer_days).map(|window| ViewingWindow {
        show_id: show.show_id,
        status: show.watch_status,
        window,
    })
}
