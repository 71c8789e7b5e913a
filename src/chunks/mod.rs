//! Incremental, chunked loading of the guide for a scrolling host

pub mod loader;
pub mod viewport;

pub use loader::{ChunkLoader, LoaderSettings, RangeLoad};
pub use viewport::{ChunkGeometry, Viewport};

use crate::guide::{DateIndex, DateIndexEntry};
use async_trait::async_trait;
use guide_core::{DateKey, DateRange, RegionCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Supplies assembled guide data for one chunk's date range
#[async_trait]
pub trait ChunkFetcher: Send + Sync {
    async fn fetch_chunk(&self, range: DateRange, region: &RegionCode) -> crate::Result<DateIndex>;
}

/// A loaded slice of the guide
#[derive(Debug, Clone, PartialEq)]
pub struct GuideChunk {
    pub index: i64,
    pub range: DateRange,
    pub region: RegionCode,
    /// Loader generation this chunk was fetched under
    pub generation: u64,
    pub days: BTreeMap<DateKey, DateIndexEntry>,
}

impl GuideChunk {
    pub fn episode_count(&self) -> usize {
        self.days.values().map(|e| e.episodes.len()).sum()
    }
}

/// Externally visible chunk lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkState {
    Unloaded,
    Loading,
    Loaded,
    Failed {
        attempts: u32,
        last_error: String,
        retry_at: Instant,
    },
}

/// Result of a chunk request that did not fail
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Arc<GuideChunk>),
    /// The region changed or the loader was invalidated while fetching
    Superseded,
}

impl LoadOutcome {
    pub fn chunk(&self) -> Option<&Arc<GuideChunk>> {
        match self {
            LoadOutcome::Loaded(chunk) => Some(chunk),
            LoadOutcome::Superseded => None,
        }
    }
}

/// Chunk loading errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ChunkLoadError {
    #[error("Chunk fetch failed: {0}")]
    Fetch(String),

    #[error("Chunk is backing off, retry in {retry_in_ms} ms")]
    BackingOff { retry_in_ms: u64 },
}
