/// In-memory cache of assembled month guides
use super::assembler::DateIndex;
use guide_core::{DateRange, RegionCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache key: one month of one region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
    pub region: RegionCode,
}

impl MonthKey {
    pub fn new(year: i32, month: u32, region: RegionCode) -> Self {
        Self { year, month, region }
    }

    pub fn range(&self) -> Option<DateRange> {
        DateRange::month(self.year, self.month)
    }
}

#[derive(Debug, Clone)]
struct CachedMonth {
    index: Arc<DateIndex>,
    stored_at: Instant,
}

/// Month guide cache with a fixed TTL
#[derive(Debug)]
pub struct MonthCache {
    entries: HashMap<MonthKey, CachedMonth>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl MonthCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            hits: 0,
            misses: 0,
        }
    }

    /// Fresh entry for `key`, dropping it if expired
    pub fn get(&mut self, key: &MonthKey) -> Option<Arc<DateIndex>> {
        let fresh = match self.entries.get(key) {
            Some(cached) if cached.stored_at.elapsed() < self.ttl => Some(cached.index.clone()),
            Some(_) => {
                debug!("Month cache expired for {}-{:02} {}", key.year, key.month, key.region);
                self.entries.remove(key);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        fresh
    }

    /// Store a month, dropping any expired months first
    pub fn insert(&mut self, key: MonthKey, index: Arc<DateIndex>) {
        let purged = self.purge_expired();
        if purged > 0 {
            debug!("Purged {} expired months", purged);
        }
        self.entries.insert(
            key,
            CachedMonth {
                index,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every month touching `range`, in any region
    pub fn invalidate_range(&mut self, range: &DateRange) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key.range().map_or(true, |month| !month.overlaps(range)));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn purge_expired(&mut self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.stored_at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn stats(&self) -> MonthCacheStats {
        let expired = self
            .entries
            .values()
            .filter(|cached| cached.stored_at.elapsed() >= self.ttl)
            .count();
        MonthCacheStats {
            entries: self.entries.len(),
            expired,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Month cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthCacheStats {
    pub entries: usize,
    pub expired: usize,
    pub hits: u64,
    pub misses: u64,
}

impl MonthCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
