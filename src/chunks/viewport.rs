/// Chunk tiling and scroll-position geometry
use chrono::NaiveDate;
use guide_core::dates::shift_days;
use guide_core::DateRange;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Fixed tiling of the timeline into `chunk_days`-long chunks.
///
/// Chunk `i` covers `anchor + i*size ..= anchor + (i+1)*size - 1`, so chunks
/// never overlap and leave no gaps. Negative indices reach before the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    anchor: NaiveDate,
    chunk_days: u32,
}

impl ChunkGeometry {
    pub fn new(anchor: NaiveDate, chunk_days: u32) -> Self {
        Self {
            anchor,
            chunk_days: chunk_days.max(1),
        }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn chunk_days(&self) -> u32 {
        self.chunk_days
    }

    pub fn day_index(&self, date: NaiveDate) -> i64 {
        (date - self.anchor).num_days()
    }

    pub fn date_at(&self, day_index: i64) -> NaiveDate {
        shift_days(self.anchor, day_index)
    }

    pub fn chunk_for_day(&self, day_index: i64) -> i64 {
        day_index.div_euclid(self.chunk_days as i64)
    }

    pub fn chunk_for_date(&self, date: NaiveDate) -> i64 {
        self.chunk_for_day(self.day_index(date))
    }

    pub fn chunk_range(&self, index: i64) -> DateRange {
        let size = self.chunk_days as i64;
        let start = self.date_at(index.saturating_mul(size));
        DateRange::new(start, shift_days(start, size - 1))
    }

    /// Every chunk touching `start..=end`
    pub fn chunks_covering(&self, start: NaiveDate, end: NaiveDate) -> RangeInclusive<i64> {
        let range = DateRange::new(start, end);
        self.chunk_for_date(range.start)..=self.chunk_for_date(range.end)
    }

    /// Every chunk touching the day-index span `first..=last`
    pub fn chunks_for_days(&self, first: i64, last: i64) -> RangeInclusive<i64> {
        let (lo, hi) = if first <= last { (first, last) } else { (last, first) };
        self.chunk_for_day(lo)..=self.chunk_for_day(hi)
    }
}

/// Widest span a viewport can show, about ten years
const MAX_VISIBLE_DAYS: i64 = 3660;

/// Furthest day index from the anchor a viewport can start at
const MAX_DAY_INDEX: i64 = 3_650_000;

/// Scroll position of a horizontally scrolling day grid.
///
/// `offset` is measured from the anchor day's left edge, in the same unit as
/// `column_width` (one column per day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub offset: f64,
    pub column_width: f64,
    pub viewport_width: f64,
}

impl Viewport {
    pub fn new(offset: f64, column_width: f64, viewport_width: f64) -> Self {
        Self {
            offset,
            column_width,
            viewport_width,
        }
    }

    fn column(&self) -> f64 {
        if self.column_width.is_finite() && self.column_width > 0.0 {
            self.column_width
        } else {
            1.0
        }
    }

    /// Day indices currently on screen, inclusive
    pub fn visible_days(&self) -> (i64, i64) {
        let column = self.column();
        let offset = if self.offset.is_finite() { self.offset } else { 0.0 };
        let first = ((offset / column).floor() as i64).clamp(-MAX_DAY_INDEX, MAX_DAY_INDEX);
        let width = if self.viewport_width.is_finite() {
            self.viewport_width.max(0.0)
        } else {
            0.0
        };
        let count = ((width / column).ceil() as i64).clamp(1, MAX_VISIBLE_DAYS);
        (first, first + count - 1)
    }

    /// Visible days widened by `margin_days` on both sides
    pub fn buffered_days(&self, margin_days: u32) -> (i64, i64) {
        let (first, last) = self.visible_days();
        let margin = margin_days as i64;
        (first - margin, last + margin)
    }

    pub fn centre_day(&self) -> i64 {
        let (first, last) = self.visible_days();
        first + (last - first) / 2
    }
}
