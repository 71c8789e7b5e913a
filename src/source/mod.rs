//! Episode/provider sources and the collect-then-merge barrier

pub mod fixture;
pub mod quality;
pub mod tmdb;

pub use fixture::{FixtureShow, FixtureSource, GuideFixture};
pub use quality::{check_episodes, check_shows, QualityReport};

use crate::chunks::ChunkFetcher;
use crate::error::{GuideError, Result};
use crate::guide::{assemble_guide, BillingCalendar, DateIndex, GuideShow};
use crate::pattern::{classify, ReleasePatternResult};
use crate::window::{viewing_window, ViewingWindow};
use async_trait::async_trait;
use futures::future::join_all;
use guide_core::{DateRange, EpisodeRecord, ProviderBadge, RegionCode, ShowId, TrackedShow};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Where episode schedules and provider availability come from
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    async fn fetch_episodes(&self, show_id: ShowId, season: u32) -> Result<Vec<EpisodeRecord>>;

    async fn fetch_providers(&self, show_id: ShowId, region: &RegionCode) -> Result<Vec<ProviderBadge>>;
}

/// Fetch a show's followed season and drop records that fail the quality pass
pub async fn fetch_checked_episodes(source: &dyn EpisodeSource, show: &TrackedShow) -> Result<Vec<EpisodeRecord>> {
    let fetched = source.fetch_episodes(show.show_id, show.season).await?;
    let (episodes, report) = check_episodes(fetched);
    if report.failed_count > 0 {
        debug!(
            "Show {}: dropped {} episode records ({} duplicates)",
            show.show_id, report.failed_count, report.duplicates
        );
    }
    Ok(episodes)
}

/// Everything fetched for one show
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedShow {
    pub show: TrackedShow,
    pub episodes: Vec<EpisodeRecord>,
    pub providers: Vec<ProviderBadge>,
}

impl CollectedShow {
    pub fn pattern(&self) -> ReleasePatternResult {
        classify(&self.episodes)
    }

    pub fn viewing_window(&self) -> Option<ViewingWindow> {
        viewing_window(&self.show, &self.episodes)
    }

    pub fn to_guide_show(&self) -> GuideShow {
        let window = self.viewing_window();
        GuideShow {
            show_id: self.show.show_id,
            title: self.show.title.clone(),
            window: window.map(|w| w.window),
            providers: self.providers.clone(),
            episodes: self.episodes.clone(),
            resubscribe_eligible: window.map_or(false, |w| w.surface_for_resubscription()),
        }
    }
}

/// A show left out of this pass
#[derive(Debug, Clone, PartialEq)]
pub struct ShowFailure {
    pub show_id: ShowId,
    pub message: String,
}

/// Barrier output: every fetch has either completed or failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedShows {
    pub shows: Vec<CollectedShow>,
    pub failures: Vec<ShowFailure>,
}

impl CollectedShows {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn guide_shows(&self) -> Vec<GuideShow> {
        self.shows.iter().map(CollectedShow::to_guide_show).collect()
    }
}

/// Fetch episodes and providers for every show, at most `max_concurrent` at a time.
///
/// Returns only once every fetch has finished. A failing show is logged and
/// reported in `failures`; it never fails the batch.
pub async fn collect_shows(
    source: Arc<dyn EpisodeSource>,
    shows: &[TrackedShow],
    region: &RegionCode,
    max_concurrent: usize,
) -> CollectedShows {
    let start_time = Instant::now();
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let handles = shows.iter().cloned().map(|show| {
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        let region = region.clone();

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| GuideError::fetch_failed(show.show_id, e.to_string()))?;

            let episodes = fetch_checked_episodes(source.as_ref(), &show).await?;
            let providers = source.fetch_providers(show.show_id, &region).await?;
            debug!(
                "Fetched show {}: {} episodes, {} providers",
                show.show_id,
                episodes.len(),
                providers.len()
            );
            Ok::<_, GuideError>(CollectedShow {
                show,
                episodes,
                providers,
            })
        })
    });

    let results = join_all(handles).await;

    let mut collected = CollectedShows::default();
    for (show, result) in shows.iter().zip(results) {
        let failure = match result {
            Ok(Ok(fetched)) => {
                collected.shows.push(fetched);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("fetch task failed: {}", e),
        };
        warn!("❌ Skipping show {} ({}): {}", show.show_id, show.title, failure);
        collected.failures.push(ShowFailure {
            show_id: show.show_id,
            message: failure,
        });
    }

    info!(
        "✅ Collected {}/{} shows for {} in {:.2}s",
        collected.shows.len(),
        shows.len(),
        region,
        start_time.elapsed().as_secs_f64()
    );
    collected
}

/// Collect the shows for each requested chunk and assemble it
pub struct SourceGuideFetcher {
    source: Arc<dyn EpisodeSource>,
    shows: Vec<TrackedShow>,
    billing: BillingCalendar,
    max_concurrent: usize,
}

impl SourceGuideFetcher {
    pub fn new(
        source: Arc<dyn EpisodeSource>,
        shows: Vec<TrackedShow>,
        billing: BillingCalendar,
        max_concurrent: usize,
    ) -> Self {
        Self {
            source,
            shows,
            billing,
            max_concurrent,
        }
    }
}

#[async_trait]
impl ChunkFetcher for SourceGuideFetcher {
    async fn fetch_chunk(&self, range: DateRange, region: &RegionCode) -> Result<DateIndex> {
        let collected = collect_shows(self.source.clone(), &self.shows, region, self.max_concurrent).await;
        if collected.shows.is_empty() {
            if let Some(first) = collected.failures.first() {
                return Err(GuideError::fetch_failed(first.show_id, first.message.clone()));
            }
        }
        Ok(assemble_guide(range, region, &collected.guide_shows(), &self.billing))
    }
}
