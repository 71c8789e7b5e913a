/// Host-facing session: tracked shows, region, month cache and chunk loader
use crate::chunks::{ChunkGeometry, ChunkLoader};
use crate::config::Config;
use crate::error::{GuideError, Result};
use crate::guide::{assemble_guide, BillingCalendar, DateIndex, MonthCache, MonthCacheStats, MonthKey};
use crate::pattern::{classify, predict_next_release, ReleasePatternResult};
use crate::savings::{estimate_savings, SavingsEstimate, SubscriptionWindow};
use crate::source::{collect_shows, fetch_checked_episodes, EpisodeSource, ShowFailure, SourceGuideFetcher};
use crate::window::ViewingWindow;
use chrono::NaiveDate;
use guide_core::{DateRange, GuideCoreError, RegionCode, ShowId, TrackedShow};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// An assembled guide and the shows that could not be fetched for it
#[derive(Debug, Clone)]
pub struct GuideBuild {
    pub index: Arc<DateIndex>,
    pub failures: Vec<ShowFailure>,
    pub generation: u64,
}

impl GuideBuild {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

struct SessionState {
    region: RegionCode,
    shows: Vec<TrackedShow>,
}

pub struct GuideSession {
    config: Config,
    source: Arc<dyn EpisodeSource>,
    billing: BillingCalendar,
    anchor: NaiveDate,
    state: RwLock<SessionState>,
    generation: AtomicU64,
    month_cache: Mutex<MonthCache>,
    loader: RwLock<ChunkLoader>,
}

impl GuideSession {
    /// Start a session; chunk 0 of the loader begins at `anchor`
    pub fn new(
        config: Config,
        source: Arc<dyn EpisodeSource>,
        shows: Vec<TrackedShow>,
        anchor: NaiveDate,
    ) -> Result<Self> {
        let region = RegionCode::parse(&config.source.default_region)?;
        let billing = config.billing_calendar();
        let loader = Self::make_loader(&config, &source, &billing, &shows, &region, anchor);

        info!(
            "📺 Guide session for {} shows in {} (anchor {})",
            shows.len(),
            region,
            anchor
        );

        Ok(Self {
            month_cache: Mutex::new(MonthCache::new(config.month_ttl())),
            config,
            source,
            billing,
            anchor,
            state: RwLock::new(SessionState { region, shows }),
            generation: AtomicU64::new(0),
            loader: RwLock::new(loader),
        })
    }

    fn make_loader(
        config: &Config,
        source: &Arc<dyn EpisodeSource>,
        billing: &BillingCalendar,
        shows: &[TrackedShow],
        region: &RegionCode,
        anchor: NaiveDate,
    ) -> ChunkLoader {
        let fetcher = SourceGuideFetcher::new(
            source.clone(),
            shows.to_vec(),
            billing.clone(),
            config.source.max_concurrent_fetches,
        );
        ChunkLoader::new(
            Arc::new(fetcher),
            ChunkGeometry::new(anchor, config.guide.chunk_days),
            config.loader_settings(),
            region.clone(),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn region(&self) -> RegionCode {
        self.state.read().await.region.clone()
    }

    pub async fn shows(&self) -> Vec<TrackedShow> {
        self.state.read().await.shows.clone()
    }

    /// Shared handle to the current chunk loader
    pub async fn loader(&self) -> ChunkLoader {
        self.loader.read().await.clone()
    }

    /// Change region; in-flight builds for the old region are discarded
    pub async fn set_region(&self, region: RegionCode) {
        {
            let mut state = self.state.write().await;
            if state.region == region {
                return;
            }
            state.region = region.clone();
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.month_cache.lock().await.clear();
        self.loader.read().await.set_region(region).await;
    }

    /// Replace the tracked shows and rebuild the loader around them
    pub async fn set_shows(&self, shows: Vec<TrackedShow>) {
        let region = {
            let mut state = self.state.write().await;
            state.shows = shows.clone();
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.region.clone()
        };
        self.month_cache.lock().await.clear();

        let fresh = Self::make_loader(&self.config, &self.source, &self.billing, &shows, &region, self.anchor);
        let stale = std::mem::replace(&mut *self.loader.write().await, fresh);
        stale.invalidate().await;
        debug!("Tracking {} shows, generation {}", shows.len(), self.generation());
    }

    /// Collect every show, then assemble `range`.
    ///
    /// Returns `None` when the region or show list changed while fetching.
    pub async fn build_guide(&self, range: DateRange) -> Option<GuideBuild> {
        let (generation, region, shows) = {
            let state = self.state.read().await;
            (self.generation(), state.region.clone(), state.shows.clone())
        };

        let collected = collect_shows(
            self.source.clone(),
            &shows,
            &region,
            self.config.source.max_concurrent_fetches,
        )
        .await;

        if self.generation() != generation {
            debug!("Discarding guide build for {} from generation {}", region, generation);
            return None;
        }

        let index = assemble_guide(range, &region, &collected.guide_shows(), &self.billing);
        Some(GuideBuild {
            index: Arc::new(index),
            failures: collected.failures,
            generation,
        })
    }

    /// Guide for one calendar month, served from the month cache when fresh.
    ///
    /// Only complete builds are cached so a failed show is retried next time.
    pub async fn month_guide(&self, year: i32, month: u32) -> Result<Option<GuideBuild>> {
        let range = DateRange::month(year, month)
            .ok_or_else(|| GuideCoreError::InvalidDate(format!("{}-{:02}", year, month)))?;
        let key = MonthKey::new(year, month, self.region().await);

        if let Some(index) = self.month_cache.lock().await.get(&key) {
            debug!("Month cache hit for {}-{:02} {}", year, month, key.region);
            return Ok(Some(GuideBuild {
                index,
                failures: Vec::new(),
                generation: self.generation(),
            }));
        }

        let Some(build) = self.build_guide(range).await else {
            return Ok(None);
        };

        if !build.is_partial() && build.index.region == key.region {
            let mut cache = self.month_cache.lock().await;
            if self.generation() == build.generation {
                cache.insert(key, build.index.clone());
            }
        }
        Ok(Some(build))
    }

    pub async fn invalidate_range(&self, range: &DateRange) -> usize {
        self.month_cache.lock().await.invalidate_range(range)
    }

    pub async fn cache_stats(&self) -> MonthCacheStats {
        self.month_cache.lock().await.stats()
    }

    async fn tracked(&self, show_id: ShowId) -> Result<TrackedShow> {
        self.state
            .read()
            .await
            .shows
            .iter()
            .find(|s| s.show_id == show_id)
            .cloned()
            .ok_or(GuideError::UnknownShow(show_id))
    }

    /// Classify the followed season of a tracked show
    pub async fn classify_show(&self, show_id: ShowId) -> Result<ReleasePatternResult> {
        let show = self.tracked(show_id).await?;
        let episodes = fetch_checked_episodes(self.source.as_ref(), &show).await?;
        Ok(classify(&episodes))
    }

    pub async fn predict(&self, show_id: ShowId, now: NaiveDate) -> Result<Option<NaiveDate>> {
        let result = self.classify_show(show_id).await?;
        Ok(predict_next_release(&result, now))
    }

    /// Viewing windows of every show that could be fetched
    pub async fn windows(&self) -> Vec<ViewingWindow> {
        let (region, shows) = {
            let state = self.state.read().await;
            (state.region.clone(), state.shows.clone())
        };
        collect_shows(self.source.clone(), &shows, &region, self.config.source.max_concurrent_fetches)
            .await
            .shows
            .iter()
            .filter_map(|show| show.viewing_window())
            .collect()
    }

    /// Savings for the year of `today`, one subscription per provider per window
    pub async fn estimate_savings(&self, costs: &BTreeMap<u32, f64>, today: NaiveDate) -> SavingsEstimate {
        let (region, shows) = {
            let state = self.state.read().await;
            (state.region.clone(), state.shows.clone())
        };
        let collected =
            collect_shows(self.source.clone(), &shows, &region, self.config.source.max_concurrent_fetches).await;

        let windows: Vec<SubscriptionWindow> = collected
            .shows
            .iter()
            .filter_map(|show| show.viewing_window().map(|w| (show, w.window)))
            .flat_map(|(show, window)| {
                show.providers.iter().map(move |provider| SubscriptionWindow {
                    provider_id: provider.id,
                    window,
                })
            })
            .collect();

        estimate_savings(&windows, costs, today)
    }
}
