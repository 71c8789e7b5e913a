/// Adapters from TMDB-shaped JSON payloads to the canonical guide types
use chrono::NaiveDate;
use guide_core::{EpisodeRecord, ProviderBadge, RegionCode, ShowId, TrackedShow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// `GET /tv/{id}/season/{n}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonPayload {
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episodes: Vec<RawEpisode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEpisode {
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub air_date: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
}

/// `GET /tv/{id}/watch/providers`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchProvidersPayload {
    #[serde(default)]
    pub results: BTreeMap<String, RegionProviders>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionProviders {
    #[serde(default)]
    pub link: Option<String>,
    /// Subscription providers; rent/buy offers are ignored
    #[serde(default)]
    pub flatrate: Vec<RawProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProvider {
    pub provider_id: u32,
    pub provider_name: String,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub display_priority: Option<i64>,
}

/// One entry of a `/tv/popular`, `/trending/tv/week` or `/tv/airing_today` listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawShow {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<u64>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub origin_country: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowListPayload {
    #[serde(default)]
    pub results: Vec<RawShow>,
}

/// A normalized listing entry; still unvalidated (see `quality::check_shows`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowListing {
    pub show_id: Option<ShowId>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub first_air_date: Option<NaiveDate>,
    pub popularity: f64,
    pub vote_average: f64,
    pub vote_count: u64,
    pub overview: Option<String>,
    pub origin_country: Vec<String>,
}

impl ShowListing {
    /// Track this listing's first season; needs an id and a title
    pub fn to_tracked_show(&self) -> Option<TrackedShow> {
        Some(TrackedShow::new(self.show_id?, self.title.clone()?, 1))
    }
}

/// Lenient TMDB date parsing: empty or malformed dates become `None`
pub fn parse_air_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn non_blank(raw: Option<&String>) -> Option<String> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Map a season payload to episode records.
///
/// Episodes without an episode number are skipped. An episode without its
/// own season number inherits the payload's, then `fallback_season`.
pub fn normalize_season(show_id: ShowId, fallback_season: u32, payload: &SeasonPayload) -> Vec<EpisodeRecord> {
    let season = payload.season_number.unwrap_or(fallback_season);

    let episodes: Vec<EpisodeRecord> = payload
        .episodes
        .iter()
        .filter_map(|raw| {
            let episode = raw.episode_number?;
            let title = non_blank(raw.name.as_ref()).unwrap_or_else(|| format!("Episode {}", episode));
            Some(EpisodeRecord {
                show_id,
                season: raw.season_number.unwrap_or(season),
                episode,
                air_date: parse_air_date(raw.air_date.as_deref()),
                title,
                synopsis: non_blank(raw.overview.as_ref()),
            })
        })
        .collect();

    debug!(
        "Normalized {} of {} episodes for show {}",
        episodes.len(),
        payload.episodes.len(),
        show_id
    );
    episodes
}

/// Subscription providers offered in `region`, by display priority, deduplicated by id
pub fn normalize_providers(payload: &WatchProvidersPayload, region: &RegionCode) -> Vec<ProviderBadge> {
    let Some(region_providers) = payload.results.get(region.as_str()) else {
        return Vec::new();
    };

    let mut raw: Vec<&RawProvider> = region_providers.flatrate.iter().collect();
    raw.sort_by_key(|p| p.display_priority.unwrap_or(i64::MAX));

    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|p| seen.insert(p.provider_id))
        .map(|p| {
            let badge = ProviderBadge::new(p.provider_id, p.provider_name.trim());
            match non_blank(p.logo_path.as_ref()) {
                Some(logo) => badge.with_logo(logo),
                None => badge,
            }
        })
        .collect()
}

/// Map a raw listing entry, falling back to `original_name` for the title
pub fn normalize_show(raw: &RawShow) -> ShowListing {
    ShowListing {
        show_id: raw.id.map(ShowId),
        title: non_blank(raw.name.as_ref()).or_else(|| non_blank(raw.original_name.as_ref())),
        original_title: non_blank(raw.original_name.as_ref()),
        first_air_date: parse_air_date(raw.first_air_date.as_deref()),
        popularity: raw.popularity.unwrap_or(0.0),
        vote_average: raw.vote_average.unwrap_or(0.0),
        vote_count: raw.vote_count.unwrap_or(0),
        overview: non_blank(raw.overview.as_ref()),
        origin_country: raw.origin_country.clone(),
    }
}
