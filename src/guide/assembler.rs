/// Single-pass assembly of the date-indexed viewing guide
use super::billing::BillingCalendar;
use chrono::NaiveDate;
use guide_core::{
    ActiveWindow, DateKey, DateRange, EpisodeKey, EpisodeRecord, ProviderBadge, RegionCode, ShowId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Providers shown as coloured pips per day
pub const MAX_PIPS: usize = 3;

/// Provider logos shown directly per day
pub const MAX_LOGOS: usize = 2;

/// Everything the assembler needs about one show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideShow {
    pub show_id: ShowId,
    pub title: String,
    pub window: Option<ActiveWindow>,
    pub providers: Vec<ProviderBadge>,
    pub episodes: Vec<EpisodeRecord>,
    /// Whether this show's providers count towards resubscription dates
    #[serde(default = "default_true")]
    pub resubscribe_eligible: bool,
}

fn default_true() -> bool {
    true
}

/// An episode as listed on a guide day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideEpisode {
    pub show_id: ShowId,
    pub show_title: String,
    pub season: u32,
    pub episode: u32,
    pub title: String,
}

impl GuideEpisode {
    pub fn key(&self) -> EpisodeKey {
        EpisodeKey {
            show_id: self.show_id,
            season: self.season,
            episode: self.episode,
        }
    }
}

/// Counts a cell needs to draw its provider pips and logos
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayBadges {
    pub pips: Vec<ProviderBadge>,
    pub pip_overflow: usize,
    pub logos: Vec<ProviderBadge>,
    pub logo_overflow: usize,
}

impl DayBadges {
    pub fn from_providers(providers: &[ProviderBadge]) -> Self {
        Self {
            pips: providers.iter().take(MAX_PIPS).cloned().collect(),
            pip_overflow: providers.len().saturating_sub(MAX_PIPS),
            logos: providers.iter().take(MAX_LOGOS).cloned().collect(),
            logo_overflow: providers.len().saturating_sub(MAX_LOGOS),
        }
    }

    /// `"+N"` when some logos do not fit
    pub fn logo_overflow_label(&self) -> Option<String> {
        (self.logo_overflow > 0).then(|| format!("+{}", self.logo_overflow))
    }
}

/// One calendar day of the guide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateIndexEntry {
    pub date: DateKey,
    pub episodes: Vec<GuideEpisode>,
    pub providers: Vec<ProviderBadge>,
    pub resubscribe: Vec<ProviderBadge>,
    pub badges: DayBadges,
}

impl DateIndexEntry {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date: DateKey::new(date),
            episodes: Vec::new(),
            providers: Vec::new(),
            resubscribe: Vec::new(),
            badges: DayBadges::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty() && self.providers.is_empty() && self.resubscribe.is_empty()
    }
}

/// Immutable snapshot of an assembled guide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateIndex {
    pub region: RegionCode,
    pub range: DateRange,
    pub days: BTreeMap<DateKey, DateIndexEntry>,
}

impl DateIndex {
    pub fn get(&self, date: NaiveDate) -> Option<&DateIndexEntry> {
        self.days.get(&DateKey::new(date))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DateIndexEntry> {
        self.days.values()
    }

    pub fn episode_count(&self) -> usize {
        self.days.values().map(|e| e.episodes.len()).sum()
    }
}

/// Assemble the guide for `range` in one pass.
///
/// Shows are visited in id order and every list is deduplicated (episodes by
/// `(show, season, episode)`, providers by id), so identical input always
/// yields an identical index. Shows without a window contribute nothing.
pub fn assemble_guide(
    range: DateRange,
    region: &RegionCode,
    shows: &[GuideShow],
    billing: &BillingCalendar,
) -> DateIndex {
    let mut days: BTreeMap<DateKey, DateIndexEntry> = range
        .days()
        .map(|date| (DateKey::new(date), DateIndexEntry::empty(date)))
        .collect();

    let mut ordered: Vec<&GuideShow> = shows.iter().collect();
    ordered.sort_by_key(|show| show.show_id);

    let mut seen_episodes: HashSet<EpisodeKey> = HashSet::new();
    let mut billable: Vec<ProviderBadge> = Vec::new();

    for show in &ordered {
        let Some(window) = show.window else {
            debug!("Show {} has no window, skipping", show.show_id);
            continue;
        };
        let Some(visible) = window.as_range().intersect(&range) else {
            continue;
        };

        for date in visible.days() {
            if let Some(entry) = days.get_mut(&DateKey::new(date)) {
                for provider in &show.providers {
                    push_unique(&mut entry.providers, provider);
                }
            }
        }

        for episode in &show.episodes {
            let Some(air_date) = episode.air_date else {
                continue;
            };
            if !visible.contains(air_date) || !seen_episodes.insert(episode.key()) {
                continue;
            }
            if let Some(entry) = days.get_mut(&DateKey::new(air_date)) {
                entry.episodes.push(GuideEpisode {
                    show_id: show.show_id,
                    show_title: show.title.clone(),
                    season: episode.season,
                    episode: episode.episode,
                    title: episode.title.clone(),
                });
            }
        }

        if show.resubscribe_eligible {
            for provider in &show.providers {
                push_unique(&mut billable, provider);
            }
        }
    }

    billable.sort_by_key(|p| p.id);

    for entry in days.values_mut() {
        entry.episodes.sort_by_key(|e| e.key());
        for provider in &billable {
            if billing.bills_on(provider.id, entry.date.date()) {
                push_unique(&mut entry.resubscribe, provider);
            }
        }
        entry.badges = DayBadges::from_providers(&entry.providers);
    }

    debug!(
        "Assembled {} days for {} ({} shows)",
        days.len(),
        region,
        ordered.len()
    );

    DateIndex {
        region: region.clone(),
        range,
        days,
    }
}

fn push_unique(list: &mut Vec<ProviderBadge>, provider: &ProviderBadge) {
    if !list.iter().any(|p| p.id == provider.id) {
        list.push(provider.clone());
    }
}
