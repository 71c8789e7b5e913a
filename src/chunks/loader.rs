/// Chunk loader: coalesced fetches, generation tagging, backoff and eviction
use super::viewport::{ChunkGeometry, Viewport};
use super::{ChunkFetcher, ChunkLoadError, ChunkState, GuideChunk, LoadOutcome};
use crate::guide::{DateIndex, DateIndexEntry};
use chrono::NaiveDate;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use guide_core::{DateKey, DateRange, RegionCode};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type SharedLoad = Shared<BoxFuture<'static, Result<LoadOutcome, ChunkLoadError>>>;

/// Tunables for a [`ChunkLoader`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    /// Days requested beyond each edge of the visible range
    pub trigger_margin_days: u32,
    pub max_retained_chunks: usize,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            trigger_margin_days: 7,
            max_retained_chunks: 12,
            retry_base: Duration::from_millis(500),
            retry_max: Duration::from_secs(30),
        }
    }
}

impl LoaderSettings {
    /// Backoff after the `attempts`-th consecutive failure: `base * 2^(attempts-1)`, capped
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(20);
        self.retry_base
            .saturating_mul(1u32 << exponent)
            .min(self.retry_max)
    }
}

enum Slot {
    Loading {
        generation: u64,
        future: SharedLoad,
    },
    Loaded(Arc<GuideChunk>),
    Failed {
        attempts: u32,
        last_error: String,
        retry_at: Instant,
    },
}

struct Scope {
    region: RegionCode,
}

/// Where the host is looking, as of the last viewport update
#[derive(Debug, Clone, Copy, Default)]
struct Focus {
    chunk: i64,
    /// Chunks covering the buffered viewport; never evicted
    protected: Option<(i64, i64)>,
}

impl Focus {
    fn protects(&self, index: i64) -> bool {
        self.protected
            .map_or(false, |(first, last)| (first..=last).contains(&index))
    }
}

struct LoaderInner {
    fetcher: Arc<dyn ChunkFetcher>,
    geometry: ChunkGeometry,
    settings: LoaderSettings,
    scope: RwLock<Scope>,
    generation: AtomicU64,
    focus: RwLock<Focus>,
    slots: RwLock<HashMap<i64, Slot>>,
    view: RwLock<BTreeMap<DateKey, DateIndexEntry>>,
}

/// Chunks requested together by [`ChunkLoader::load_range`]
#[derive(Debug, Clone, Default)]
pub struct RangeLoad {
    pub loaded: Vec<Arc<GuideChunk>>,
    pub failed: Vec<(i64, ChunkLoadError)>,
    pub superseded: bool,
}

impl RangeLoad {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.superseded
    }
}

/// Sliding-window guide loader shared by every view of one session.
///
/// At most one fetch runs per chunk: concurrent requests for the same chunk
/// await the same shared future. Results fetched under an older generation
/// are dropped before they reach the cumulative view.
#[derive(Clone)]
pub struct ChunkLoader {
    inner: Arc<LoaderInner>,
}

impl ChunkLoader {
    pub fn new(
        fetcher: Arc<dyn ChunkFetcher>,
        geometry: ChunkGeometry,
        settings: LoaderSettings,
        region: RegionCode,
    ) -> Self {
        let settings = LoaderSettings {
            max_retained_chunks: settings.max_retained_chunks.max(1),
            ..settings
        };
        Self {
            inner: Arc::new(LoaderInner {
                fetcher,
                geometry,
                settings,
                scope: RwLock::new(Scope { region }),
                generation: AtomicU64::new(0),
                focus: RwLock::new(Focus::default()),
                slots: RwLock::new(HashMap::new()),
                view: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn geometry(&self) -> ChunkGeometry {
        self.inner.geometry
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.inner.settings
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub async fn region(&self) -> RegionCode {
        self.inner.scope.read().await.region.clone()
    }

    /// Switch region: bumps the generation and drops every chunk
    pub async fn set_region(&self, region: RegionCode) {
        let mut scope = self.inner.scope.write().await;
        if scope.region == region {
            return;
        }
        info!("🌍 Guide region changed {} -> {}", scope.region, region);
        scope.region = region;
        self.inner.reset().await;
    }

    /// Drop every chunk and start a new generation in the same region
    pub async fn invalidate(&self) {
        let _scope = self.inner.scope.write().await;
        self.inner.reset().await;
    }

    /// Load chunk `index`, joining an in-flight fetch if one exists
    pub async fn load_chunk(&self, index: i64) -> Result<LoadOutcome, ChunkLoadError> {
        let (generation, region) = {
            let scope = self.inner.scope.read().await;
            (self.generation(), scope.region.clone())
        };

        {
            let slots = self.inner.slots.read().await;
            match slots.get(&index) {
                Some(Slot::Loaded(chunk)) if chunk.generation == generation => {
                    return Ok(LoadOutcome::Loaded(chunk.clone()));
                }
                Some(Slot::Loading { generation: g, future }) if *g == generation => {
                    let future = future.clone();
                    drop(slots);
                    debug!("Joining in-flight fetch for chunk {}", index);
                    return future.await;
                }
                _ => {}
            }
        }

        let future = {
            let mut slots = self.inner.slots.write().await;
            if !self.inner.is_current(generation) {
                return Ok(LoadOutcome::Superseded);
            }

            let prior_attempts = match slots.get(&index) {
                Some(Slot::Loaded(chunk)) => return Ok(LoadOutcome::Loaded(chunk.clone())),
                Some(Slot::Loading { future, .. }) => {
                    let future = future.clone();
                    drop(slots);
                    return future.await;
                }
                Some(Slot::Failed {
                    attempts, retry_at, ..
                }) => {
                    let now = Instant::now();
                    if now < *retry_at {
                        return Err(ChunkLoadError::BackingOff {
                            retry_in_ms: (*retry_at - now).as_millis() as u64,
                        });
                    }
                    *attempts
                }
                None => 0,
            };

            let future = self.inner.clone().spawn_fetch(index, region, generation, prior_attempts);
            slots.insert(
                index,
                Slot::Loading {
                    generation,
                    future: future.clone(),
                },
            );
            future
        };

        future.await
    }

    /// Load every chunk touching `start..=end`, concurrently
    pub async fn load_range(&self, start: NaiveDate, end: NaiveDate) -> RangeLoad {
        let indices: Vec<i64> = self.inner.geometry.chunks_covering(start, end).collect();
        self.load_indices(indices).await
    }

    async fn load_indices(&self, indices: Vec<i64>) -> RangeLoad {
        let results = join_all(indices.iter().map(|index| self.load_chunk(*index))).await;

        let mut load = RangeLoad::default();
        for (index, result) in indices.into_iter().zip(results) {
            match result {
                Ok(LoadOutcome::Loaded(chunk)) => load.loaded.push(chunk),
                Ok(LoadOutcome::Superseded) => load.superseded = true,
                Err(e) => load.failed.push((index, e)),
            }
        }
        load
    }

    /// Record the viewport and return the chunks that should be requested
    pub async fn update_viewport(&self, viewport: &Viewport) -> Vec<i64> {
        let geometry = self.inner.geometry;
        let (first, last) = viewport.buffered_days(self.inner.settings.trigger_margin_days);
        *self.inner.focus.write().await = Focus {
            chunk: geometry.chunk_for_day(viewport.centre_day()),
            protected: Some((geometry.chunk_for_day(first), geometry.chunk_for_day(last))),
        };
        self.chunks_to_request(viewport).await
    }

    /// Chunks covering the buffered viewport that are neither loaded nor loading
    pub async fn chunks_to_request(&self, viewport: &Viewport) -> Vec<i64> {
        let (first, last) = viewport.buffered_days(self.inner.settings.trigger_margin_days);
        let generation = self.generation();
        let now = Instant::now();
        let slots = self.inner.slots.read().await;

        self.inner
            .geometry
            .chunks_for_days(first, last)
            .filter(|index| match slots.get(index) {
                Some(Slot::Loaded(chunk)) => chunk.generation != generation,
                Some(Slot::Loading { generation: g, .. }) => *g != generation,
                Some(Slot::Failed { retry_at, .. }) => now >= *retry_at,
                None => true,
            })
            .collect()
    }

    /// Update the viewport and load whatever it needs
    pub async fn ensure_visible(&self, viewport: &Viewport) -> RangeLoad {
        let wanted = self.update_viewport(viewport).await;
        if wanted.is_empty() {
            return RangeLoad::default();
        }
        debug!("Viewport requests chunks {:?}", wanted);
        self.load_indices(wanted).await
    }

    pub async fn chunk_state(&self, index: i64) -> ChunkState {
        let generation = self.generation();
        match self.inner.slots.read().await.get(&index) {
            None => ChunkState::Unloaded,
            Some(Slot::Loading { generation: g, .. }) if *g == generation => ChunkState::Loading,
            Some(Slot::Loading { .. }) => ChunkState::Unloaded,
            Some(Slot::Loaded(_)) => ChunkState::Loaded,
            Some(Slot::Failed {
                attempts,
                last_error,
                retry_at,
            }) => ChunkState::Failed {
                attempts: *attempts,
                last_error: last_error.clone(),
                retry_at: *retry_at,
            },
        }
    }

    /// Indices of loaded chunks, ascending
    pub async fn loaded_chunks(&self) -> Vec<i64> {
        let slots = self.inner.slots.read().await;
        let mut indices: Vec<i64> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Loaded(_)))
            .map(|(index, _)| *index)
            .collect();
        indices.sort_unstable();
        indices
    }

    pub async fn entry(&self, date: NaiveDate) -> Option<DateIndexEntry> {
        self.inner.view.read().await.get(&DateKey::new(date)).cloned()
    }

    /// Snapshot of the cumulative view, or `None` when nothing is loaded
    pub async fn date_index(&self) -> Option<DateIndex> {
        let region = self.region().await;
        let view = self.inner.view.read().await;
        let first = view.keys().next()?.date();
        let last = view.keys().next_back()?.date();
        Some(DateIndex {
            region,
            range: DateRange::new(first, last),
            days: view.clone(),
        })
    }
}

impl LoaderInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Caller holds the scope write lock
    async fn reset(&self) {
        let mut slots = self.slots.write().await;
        let mut view = self.view.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        slots.clear();
        view.clear();
        debug!("Chunk loader reset, generation {}", generation);
    }

    fn spawn_fetch(
        self: Arc<Self>,
        index: i64,
        region: RegionCode,
        generation: u64,
        prior_attempts: u32,
    ) -> SharedLoad {
        let task_inner = self.clone();
        let handle = tokio::spawn(async move {
            task_inner
                .fetch_and_merge(index, region, generation, prior_attempts)
                .await
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let message = format!("chunk task aborted: {}", e);
                    self.record_failure(index, generation, prior_attempts, &message)
                        .await;
                    Err(ChunkLoadError::Fetch(message))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn fetch_and_merge(
        &self,
        index: i64,
        region: RegionCode,
        generation: u64,
        prior_attempts: u32,
    ) -> Result<LoadOutcome, ChunkLoadError> {
        let range = self.geometry.chunk_range(index);
        debug!("Fetching chunk {} ({}) for {}", index, range, region);

        let fetched = self.fetcher.fetch_chunk(range, &region).await;

        match fetched {
            Ok(index_data) => {
                let focus = *self.focus.read().await;
                let mut slots = self.slots.write().await;
                if !self.is_current(generation) {
                    debug!("Discarding chunk {} from stale generation {}", index, generation);
                    return Ok(LoadOutcome::Superseded);
                }

                let days: BTreeMap<DateKey, DateIndexEntry> = index_data
                    .days
                    .into_iter()
                    .filter(|(key, _)| range.contains(key.date()))
                    .collect();
                let chunk = Arc::new(GuideChunk {
                    index,
                    range,
                    region,
                    generation,
                    days,
                });

                let mut view = self.view.write().await;
                for (key, entry) in &chunk.days {
                    view.insert(*key, entry.clone());
                }
                slots.insert(index, Slot::Loaded(chunk.clone()));
                self.evict_excess(&mut slots, &mut view, &focus);

                debug!("Loaded chunk {} with {} episodes", index, chunk.episode_count());
                Ok(LoadOutcome::Loaded(chunk))
            }
            Err(e) => {
                let message = e.to_string();
                if !self.record_failure(index, generation, prior_attempts, &message).await {
                    return Ok(LoadOutcome::Superseded);
                }
                Err(ChunkLoadError::Fetch(message))
            }
        }
    }

    /// Mark a chunk failed unless its generation is stale
    async fn record_failure(
        &self,
        index: i64,
        generation: u64,
        prior_attempts: u32,
        message: &str,
    ) -> bool {
        let mut slots = self.slots.write().await;
        if !self.is_current(generation) {
            return false;
        }
        let attempts = prior_attempts + 1;
        let delay = self.settings.backoff(attempts);
        warn!(
            "Chunk {} failed (attempt {}), retrying in {:?}: {}",
            index, attempts, delay, message
        );
        slots.insert(
            index,
            Slot::Failed {
                attempts,
                last_error: message.to_string(),
                retry_at: Instant::now() + delay,
            },
        );
        true
    }

    /// Drop the loaded chunks furthest from the focus until within budget.
    ///
    /// Chunks under the buffered viewport are kept even past the budget.
    fn evict_excess(
        &self,
        slots: &mut HashMap<i64, Slot>,
        view: &mut BTreeMap<DateKey, DateIndexEntry>,
        focus: &Focus,
    ) {
        let loaded = slots
            .values()
            .filter(|slot| matches!(slot, Slot::Loaded(_)))
            .count();
        let budget = self.settings.max_retained_chunks;
        if loaded <= budget {
            return;
        }

        let excess = loaded - budget;
        let mut candidates: Vec<i64> = slots
            .iter()
            .filter(|(index, slot)| matches!(slot, Slot::Loaded(_)) && !focus.protects(**index))
            .map(|(index, _)| *index)
            .collect();
        let centre = focus.chunk;
        // Furthest first; ties evict the later chunk
        candidates.sort_by_key(|index| (Reverse((index - centre).abs()), Reverse(*index)));

        for index in candidates.into_iter().take(excess) {
            if let Some(Slot::Loaded(chunk)) = slots.remove(&index) {
                for key in chunk.days.keys() {
                    view.remove(key);
                }
                debug!("Evicted chunk {} (focus {})", index, centre);
            }
        }
    }
}
