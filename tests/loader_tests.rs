use async_trait::async_trait;
use chrono::NaiveDate;
use guide_core::dates::shift_days;
use guide_core::{ActiveWindow, DateRange, EpisodeRecord, ProviderBadge, RegionCode, ShowId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_guide::chunks::{ChunkGeometry, LoaderSettings};
use tally_guide::{
    assemble_guide, BillingCalendar, ChunkFetcher, ChunkLoadError, ChunkLoader, ChunkState, DateIndex, GuideError,
    GuideShow, LoadOutcome, Viewport,
};
use tokio::sync::Semaphore;

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn region(code: &str) -> RegionCode {
    RegionCode::parse(code).unwrap()
}

/// Fetcher that assembles one all-year show, with optional gating and failures
struct TestFetcher {
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    /// Failures left for the chunk starting at the anchor
    anchor_failures: AtomicUsize,
    shows: Vec<GuideShow>,
}

impl TestFetcher {
    fn new() -> Self {
        let providers = vec![ProviderBadge::new(8, "Netflix")];
        let episodes = (0..52)
            .map(|week| EpisodeRecord::new(ShowId(1), 1, week + 1, shift_days(anchor(), week as i64 * 7), "Episode"))
            .collect();
        Self {
            calls: AtomicUsize::new(0),
            gate: None,
            anchor_failures: AtomicUsize::new(0),
            shows: vec![GuideShow {
                show_id: ShowId(1),
                title: "Year Long".to_string(),
                window: Some(ActiveWindow::new(anchor(), shift_days(anchor(), 400))),
                providers,
                episodes,
                resubscribe_eligible: true,
            }],
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    fn failing_at_anchor(times: usize) -> Self {
        Self {
            anchor_failures: AtomicUsize::new(times),
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkFetcher for TestFetcher {
    async fn fetch_chunk(&self, range: DateRange, region: &RegionCode) -> tally_guide::Result<DateIndex> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.map(|permit| permit.forget()).ok();
        }
        if range.start == anchor()
            && self
                .anchor_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
        {
            return Err(GuideError::Config("upstream unavailable".to_string()));
        }
        Ok(assemble_guide(range, region, &self.shows, &BillingCalendar::new()))
    }
}

fn loader_with(fetcher: Arc<TestFetcher>, chunk_days: u32, settings: LoaderSettings) -> ChunkLoader {
    ChunkLoader::new(fetcher, ChunkGeometry::new(anchor(), chunk_days), settings, region("US"))
}

async fn wait_for_calls(fetcher: &TestFetcher, expected: usize) {
    for _ in 0..200 {
        if fetcher.calls() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("fetcher never reached {} calls", expected);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = Arc::new(TestFetcher::gated(gate.clone()));
    let loader = loader_with(fetcher.clone(), 30, LoaderSettings::default());

    let first = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load_chunk(0).await }
    });
    wait_for_calls(&fetcher, 1).await;
    assert_eq!(loader.chunk_state(0).await, ChunkState::Loading);

    let second = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load_chunk(0).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.add_permits(10);

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    let (a, b) = (a.chunk().unwrap().clone(), b.chunk().unwrap().clone());

    assert_eq!(fetcher.calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.range, DateRange::new(anchor(), shift_days(anchor(), 29)));
    assert_eq!(loader.chunk_state(0).await, ChunkState::Loaded);
}

#[tokio::test]
async fn test_region_change_discards_in_flight_chunk() {
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = Arc::new(TestFetcher::gated(gate.clone()));
    let loader = loader_with(fetcher.clone(), 30, LoaderSettings::default());

    let stale = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load_chunk(0).await }
    });
    wait_for_calls(&fetcher, 1).await;

    loader.set_region(region("GB")).await;
    gate.add_permits(10);

    assert!(matches!(stale.await.unwrap(), Ok(LoadOutcome::Superseded)));
    assert!(loader.date_index().await.is_none());
    assert_eq!(loader.chunk_state(0).await, ChunkState::Unloaded);

    let fresh = loader.load_chunk(0).await.unwrap();
    assert_eq!(fresh.chunk().unwrap().region.as_str(), "GB");
    assert_eq!(fetcher.calls(), 2);

    let index = loader.date_index().await.unwrap();
    assert_eq!(index.region.as_str(), "GB");
    assert_eq!(index.len(), 30);
}

#[tokio::test]
async fn test_failed_chunk_backs_off_then_retries() {
    let fetcher = Arc::new(TestFetcher::failing_at_anchor(1));
    let settings = LoaderSettings {
        retry_base: Duration::from_millis(40),
        retry_max: Duration::from_secs(1),
        ..LoaderSettings::default()
    };
    let loader = loader_with(fetcher.clone(), 30, settings);

    let failed = loader.load_chunk(0).await;
    assert!(matches!(failed, Err(ChunkLoadError::Fetch(_))));
    assert!(matches!(
        loader.chunk_state(0).await,
        ChunkState::Failed { attempts: 1, .. }
    ));
    assert!(matches!(
        loader.load_chunk(0).await,
        Err(ChunkLoadError::BackingOff { .. })
    ));

    // Neighbouring chunks are unaffected
    assert!(loader.load_chunk(1).await.unwrap().chunk().is_some());
    assert_eq!(fetcher.calls(), 2);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let retried = loader.load_chunk(0).await.unwrap();
    assert_eq!(retried.chunk().unwrap().index, 0);
    assert_eq!(fetcher.calls(), 3);
    assert_eq!(loader.loaded_chunks().await, vec![0, 1]);
}

#[tokio::test]
async fn test_load_range_is_idempotent() {
    let fetcher = Arc::new(TestFetcher::new());
    let loader = loader_with(fetcher.clone(), 30, LoaderSettings::default());
    let end = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

    let first = loader.load_range(anchor(), end).await;
    assert!(first.is_complete());
    assert_eq!(first.loaded.len(), 3);

    let again = loader.load_range(end, anchor()).await;
    assert_eq!(again.loaded.len(), 3);
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn test_merge_keeps_earlier_chunks() {
    let fetcher = Arc::new(TestFetcher::new());
    let loader = loader_with(fetcher, 14, LoaderSettings::default());

    loader.load_chunk(0).await.unwrap();
    let jan_1 = loader.entry(anchor()).await.unwrap();
    loader.load_chunk(1).await.unwrap();
    loader.load_chunk(-1).await.unwrap();

    assert_eq!(loader.entry(anchor()).await.unwrap(), jan_1);
    let index = loader.date_index().await.unwrap();
    assert_eq!(index.len(), 42);
    assert_eq!(index.range.start, shift_days(anchor(), -14));
    assert_eq!(index.episode_count(), 4);
}

#[tokio::test]
async fn test_viewport_requests_ahead_of_loaded_data() {
    let fetcher = Arc::new(TestFetcher::new());
    let loader = loader_with(fetcher, 7, LoaderSettings::default());

    // Ten 10px columns: days 0..=9, widened by 7 to -7..=16
    let viewport = Viewport::new(0.0, 10.0, 100.0);
    assert_eq!(loader.update_viewport(&viewport).await, vec![-1, 0, 1, 2]);

    let load = loader.ensure_visible(&viewport).await;
    assert_eq!(load.loaded.len(), 4);
    assert!(loader.chunks_to_request(&viewport).await.is_empty());

    // Still inside loaded data, but within the margin of its tail
    let scrolled = Viewport::new(70.0, 10.0, 100.0);
    assert_eq!(loader.chunks_to_request(&scrolled).await, vec![3]);
}

#[tokio::test]
async fn test_eviction_drops_furthest_chunks() {
    let fetcher = Arc::new(TestFetcher::new());
    let settings = LoaderSettings {
        max_retained_chunks: 3,
        ..LoaderSettings::default()
    };
    let loader = loader_with(fetcher, 7, settings);
    loader.update_viewport(&Viewport::new(0.0, 10.0, 50.0)).await;

    let load = loader.load_range(anchor(), shift_days(anchor(), 6 * 7 - 1)).await;
    assert_eq!(load.loaded.len(), 6);

    assert_eq!(loader.loaded_chunks().await, vec![0, 1, 2]);
    assert_eq!(loader.chunk_state(4).await, ChunkState::Unloaded);
    assert!(loader.entry(shift_days(anchor(), 30)).await.is_none());
    assert!(loader.entry(shift_days(anchor(), 20)).await.is_some());
    assert_eq!(loader.date_index().await.unwrap().len(), 21);
}

#[tokio::test]
async fn test_invalidate_starts_new_generation() {
    let fetcher = Arc::new(TestFetcher::new());
    let loader = loader_with(fetcher.clone(), 30, LoaderSettings::default());

    let before = loader.load_chunk(0).await.unwrap();
    assert_eq!(before.chunk().unwrap().generation, 0);

    loader.invalidate().await;
    assert_eq!(loader.generation(), 1);
    assert!(loader.loaded_chunks().await.is_empty());

    let after = loader.load_chunk(0).await.unwrap();
    assert_eq!(after.chunk().unwrap().generation, 1);
    assert_eq!(fetcher.calls(), 2);
}

#[test]
fn test_same_region_is_not_a_reset() {
    tokio_test::block_on(async {
        let loader = loader_with(Arc::new(TestFetcher::new()), 30, LoaderSettings::default());
        loader.set_region(region("us")).await;
        assert_eq!(loader.generation(), 0);
        loader.set_region(region("CA")).await;
        assert_eq!(loader.generation(), 1);
        assert_eq!(loader.region().await.as_str(), "CA");
    });
}

#[tokio::test]
async fn test_buffered_viewport_is_never_evicted() {
    let fetcher = Arc::new(TestFetcher::new());
    let settings = LoaderSettings {
        max_retained_chunks: 3,
        ..LoaderSettings::default()
    };
    let loader = loader_with(fetcher.clone(), 7, settings);

    // Buffered days -7..=16 need four chunks against a budget of three
    let viewport = Viewport::new(0.0, 10.0, 100.0);
    for _ in 0..3 {
        loader.ensure_visible(&viewport).await;
        assert!(loader.chunks_to_request(&viewport).await.is_empty());
    }
    assert_eq!(fetcher.calls(), 4);
    assert_eq!(loader.loaded_chunks().await, vec![-1, 0, 1, 2]);
    assert!(loader.entry(shift_days(anchor(), 20)).await.is_some());

    // Scrolling away lets the old chunks go
    let scrolled = Viewport::new(700.0, 10.0, 100.0);
    let load = loader.ensure_visible(&scrolled).await;
    assert_eq!(load.loaded.len(), 4);
    assert_eq!(loader.loaded_chunks().await, vec![9, 10, 11, 12]);
    assert!(loader.entry(anchor()).await.is_none());
}
