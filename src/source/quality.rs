/// Data-quality checks applied to normalized source records
use super::tmdb::ShowListing;
use guide_core::{EpisodeKey, EpisodeRecord, ShowId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// What a quality pass removed, and why
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub initial_count: usize,
    pub missing_id: usize,
    pub missing_title: usize,
    pub invalid_popularity: usize,
    pub duplicates: usize,
    pub final_count: usize,
    pub failed_count: usize,
    /// `final_count / initial_count`, or 0 for empty input
    pub pass_rate: f64,
}

impl QualityReport {
    fn finish(mut self, label: &str, final_count: usize) -> Self {
        self.final_count = final_count;
        self.failed_count = self.initial_count - final_count;
        self.pass_rate = if self.initial_count > 0 {
            final_count as f64 / self.initial_count as f64
        } else {
            0.0
        };
        if self.failed_count > 0 {
            info!(
                "Data quality ({}): {}/{} passed ({:.1}%)",
                label,
                final_count,
                self.initial_count,
                self.pass_rate * 100.0
            );
        } else {
            debug!("Data quality ({}): all {} passed", label, final_count);
        }
        self
    }
}

/// Keep show listings with an id, a title and a non-negative popularity.
/// Duplicate ids keep their first occurrence.
pub fn check_shows(listings: Vec<ShowListing>) -> (Vec<ShowListing>, QualityReport) {
    let mut report = QualityReport {
        initial_count: listings.len(),
        ..QualityReport::default()
    };
    let mut seen: HashSet<ShowId> = HashSet::new();
    let mut kept = Vec::with_capacity(listings.len());

    for listing in listings {
        let Some(show_id) = listing.show_id else {
            report.missing_id += 1;
            continue;
        };
        if listing.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            report.missing_title += 1;
            continue;
        }
        if !(listing.popularity >= 0.0) {
            report.invalid_popularity += 1;
            continue;
        }
        if !seen.insert(show_id) {
            report.duplicates += 1;
            continue;
        }
        kept.push(listing);
    }

    let final_count = kept.len();
    (kept, report.finish("shows", final_count))
}

/// Keep numbered, titled episodes. Duplicate `(show, season, episode)` keys
/// keep their first occurrence.
pub fn check_episodes(episodes: Vec<EpisodeRecord>) -> (Vec<EpisodeRecord>, QualityReport) {
    let mut report = QualityReport {
        initial_count: episodes.len(),
        ..QualityReport::default()
    };
    let mut seen: HashSet<EpisodeKey> = HashSet::new();
    let mut kept = Vec::with_capacity(episodes.len());

    for episode in episodes {
        if episode.episode == 0 {
            report.missing_id += 1;
            continue;
        }
        if episode.title.trim().is_empty() {
            report.missing_title += 1;
            continue;
        }
        if !seen.insert(episode.key()) {
            report.duplicates += 1;
            continue;
        }
        kept.push(episode);
    }

    let final_count = kept.len();
    (kept, report.finish("episodes", final_count))
}
