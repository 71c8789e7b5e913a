//! Calendar date keys, ranges and viewing windows

use crate::{GuideCoreError, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical `yyyy-mm-dd` day key. Ordering follows the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        DateKey(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        DateKey(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = GuideCoreError;

    fn from_str(s: &str) -> Result<Self> {
        parse_date(s).map(DateKey)
    }
}

impl TryFrom<String> for DateKey {
    type Error = GuideCoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

/// Parse a strict `yyyy-mm-dd` date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| GuideCoreError::InvalidDate(raw.to_string()))
}

/// Shift a date by a signed number of days, saturating at the calendar bounds
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Number of days in the given month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

/// Whether `date` is the last calendar day of its month
pub fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.day() == days_in_month(date.year(), date.month())
}

/// Number of days in the given year
pub fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// An inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range; the endpoints are ordered so `start <= end` always holds
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    /// Whole calendar month
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))?;
        Some(Self { start, end })
    }

    /// Whole calendar year
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(Self { start, end })
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(DateRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Iterate every day in the range, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", DateKey(self.start), DateKey(self.end))
    }
}

/// Per-show buffer extending a viewing window on both ends, in `[0, 30]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct BufferDays(u8);

impl BufferDays {
    pub const MAX: u8 = 30;

    /// Clamp any raw setting into range; out-of-range values are never rejected
    pub fn clamped(raw: i64) -> Self {
        BufferDays(raw.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn days(&self) -> i64 {
        self.0 as i64
    }
}

impl From<i64> for BufferDays {
    fn from(raw: i64) -> Self {
        BufferDays::clamped(raw)
    }
}

impl From<BufferDays> for i64 {
    fn from(buffer: BufferDays) -> Self {
        buffer.days()
    }
}

/// The inclusive date span during which a show is relevant to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ActiveWindow {
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        let range = DateRange::new(a, b);
        Self { start: range.start, end: range.end }
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    /// Extend both ends by the buffer
    pub fn extended(&self, buffer: BufferDays) -> Self {
        Self {
            start: shift_days(self.start, -buffer.days()),
            end: shift_days(self.end, buffer.days()),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn as_range(&self) -> DateRange {
        DateRange { start: self.start, end: self.end }
    }

    pub fn len_days(&self) -> i64 {
        self.as_range().len_days()
    }
}
