/// In-memory [`EpisodeSource`] backed by a JSON fixture of TMDB-shaped payloads
use super::quality::{check_shows, QualityReport};
use super::tmdb::{self, SeasonPayload, ShowListPayload, ShowListing, WatchProvidersPayload};
use super::EpisodeSource;
use crate::error::{GuideError, Result};
use crate::guide::BillingDay;
use async_trait::async_trait;
use guide_core::{EpisodeRecord, ProviderBadge, RegionCode, ShowId, TrackedShow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

/// On-disk fixture layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuideFixture {
    #[serde(default)]
    pub region: Option<RegionCode>,
    #[serde(default)]
    pub shows: Vec<FixtureShow>,
    /// Monthly cost per provider id
    #[serde(default)]
    pub costs: BTreeMap<u32, f64>,
    #[serde(default)]
    pub billing: Vec<BillingDay>,
    /// Raw show listing (e.g. a trending page) offered for discovery
    #[serde(default)]
    pub listings: ShowListPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureShow {
    pub show: TrackedShow,
    #[serde(default)]
    pub season: SeasonPayload,
    #[serde(default)]
    pub providers: WatchProvidersPayload,
    /// Fetches for this show fail
    #[serde(default)]
    pub fail: bool,
}

impl GuideFixture {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let fixture = Self::from_json(&content)?;
        info!("📁 Loaded fixture with {} shows from {}", fixture.shows.len(), path.display());
        Ok(fixture)
    }

    pub fn tracked_shows(&self) -> Vec<TrackedShow> {
        self.shows.iter().map(|s| s.show.clone()).collect()
    }

    /// Validated listings, most popular first
    pub fn discover(&self) -> (Vec<ShowListing>, QualityReport) {
        let listings = self.listings.results.iter().map(tmdb::normalize_show).collect();
        let (mut kept, report) = check_shows(listings);
        kept.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
        (kept, report)
    }
}

#[derive(Debug, Default)]
struct FixtureData {
    episodes: HashMap<(ShowId, u32), Vec<EpisodeRecord>>,
    providers: HashMap<ShowId, WatchProvidersPayload>,
    failing: HashSet<ShowId>,
}

#[derive(Debug, Default)]
pub struct FixtureSource {
    data: RwLock<FixtureData>,
    delay: Duration,
    episode_fetches: AtomicUsize,
    provider_fetches: AtomicUsize,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: &GuideFixture) -> Self {
        let source = Self::new();
        for show in &fixture.shows {
            source.insert_show(show);
        }
        source
    }

    /// Sleep this long inside every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn insert_show(&self, show: &FixtureShow) {
        let show_id = show.show.show_id;
        let episodes = tmdb::normalize_season(show_id, show.show.season, &show.season);
        let mut data = self.write_data();
        data.episodes.insert((show_id, show.show.season), episodes);
        data.providers.insert(show_id, show.providers.clone());
        if show.fail {
            data.failing.insert(show_id);
        } else {
            data.failing.remove(&show_id);
        }
    }

    pub fn set_failing(&self, show_id: ShowId, failing: bool) {
        let mut data = self.write_data();
        if failing {
            data.failing.insert(show_id);
        } else {
            data.failing.remove(&show_id);
        }
    }

    pub fn episode_fetches(&self) -> usize {
        self.episode_fetches.load(Ordering::SeqCst)
    }

    pub fn provider_fetches(&self) -> usize {
        self.provider_fetches.load(Ordering::SeqCst)
    }

    fn write_data(&self) -> std::sync::RwLockWriteGuard<'_, FixtureData> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_data(&self) -> std::sync::RwLockReadGuard<'_, FixtureData> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failing(&self, show_id: ShowId) -> Result<()> {
        if self.read_data().failing.contains(&show_id) {
            return Err(GuideError::fetch_failed(show_id, "fixture marks this show as failing"));
        }
        Ok(())
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl EpisodeSource for FixtureSource {
    async fn fetch_episodes(&self, show_id: ShowId, season: u32) -> Result<Vec<EpisodeRecord>> {
        self.episode_fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_failing(show_id)?;

        let episodes = self
            .read_data()
            .episodes
            .get(&(show_id, season))
            .cloned()
            .unwrap_or_default();
        debug!("Fixture returned {} episodes for show {} S{}", episodes.len(), show_id, season);
        Ok(episodes)
    }

    async fn fetch_providers(&self, show_id: ShowId, region: &RegionCode) -> Result<Vec<ProviderBadge>> {
        self.provider_fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_failing(show_id)?;

        Ok(self
            .read_data()
            .providers
            .get(&show_id)
            .map(|payload| tmdb::normalize_providers(payload, region))
            .unwrap_or_default())
    }
}
