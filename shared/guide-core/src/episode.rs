//! Episode records as supplied by the episode source

use crate::ShowId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identity of an episode: `(show, season, episode)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub show_id: ShowId,
    pub season: u32,
    pub episode: u32,
}

/// A single episode with its (optional) air date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Owning show
    pub show_id: ShowId,

    /// Season number (0 is used by providers for specials)
    pub season: u32,

    /// Episode number within the season
    pub episode: u32,

    /// Calendar air date, if announced
    pub air_date: Option<NaiveDate>,

    /// Episode title
    pub title: String,

    /// Optional synopsis
    #[serde(default)]
    pub synopsis: Option<String>,
}

impl EpisodeRecord {
    /// Create a dated episode record
    pub fn new(show_id: ShowId, season: u32, episode: u32, air_date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            show_id,
            season,
            episode,
            air_date: Some(air_date),
            title: title.into(),
            synopsis: None,
        }
    }

    /// Create a record whose air date is not yet known
    pub fn undated(show_id: ShowId, season: u32, episode: u32, title: impl Into<String>) -> Self {
        Self {
            show_id,
            season,
            episode,
            air_date: None,
            title: title.into(),
            synopsis: None,
        }
    }

    pub fn with_synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.synopsis = Some(synopsis.into());
        self
    }

    pub fn key(&self) -> EpisodeKey {
        EpisodeKey {
            show_id: self.show_id,
            season: self.season,
            episode: self.episode,
        }
    }

    /// Short `S01E03` style label
    pub fn code(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.episode)
    }
}
