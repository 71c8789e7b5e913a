/// Annual-cadence renewal prediction
use super::ReleasePatternResult;
use chrono::{Datelike, NaiveDate};

/// A new season is expected this many months after the last one ended
const RENEWAL_MIN_MONTHS: i32 = 9;
const RENEWAL_MAX_MONTHS: i32 = 15;

/// Predict the start of the next season for a show on a yearly cycle.
///
/// Only meaningful between seasons: returns `None` for unknown patterns, for
/// missing season dates, and whenever the previous season ended outside the
/// 9-15 month renewal window relative to `now`.
pub fn predict_next_release(result: &ReleasePatternResult, now: NaiveDate) -> Option<NaiveDate> {
    if !result.is_known() {
        return None;
    }
    let season_start = result.season_start?;
    let season_end = result.season_end?;

    let months = months_between(season_end, now);
    if !(RENEWAL_MIN_MONTHS..=RENEWAL_MAX_MONTHS).contains(&months) {
        return None;
    }

    let this_year = same_day_in_year(season_start, now.year())?;
    if this_year >= now {
        Some(this_year)
    } else {
        same_day_in_year(season_start, now.year() + 1)
    }
}

/// Whole calendar months from `from` to `to` (negative if `to` is earlier)
fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if months > 0 && to.day() < from.day() {
        months -= 1;
    } else if months < 0 && to.day() > from.day() {
        months += 1;
    }
    months
}

/// Move a date into another year; Feb 29 becomes Feb 28 in common years
fn same_day_in_year(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PatternDiagnostics, ReleasePattern};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn season(pattern: ReleasePattern, start: NaiveDate, end: NaiveDate) -> ReleasePatternResult {
        ReleasePatternResult {
            pattern,
            confidence: 0.9,
            episode_interval_days: Some(7),
            season_start: Some(start),
            season_end: Some(end),
            total_episodes: 8,
            diagnostics: PatternDiagnostics::default(),
        }
    }

    #[test]
    fn test_unknown_pattern_has_no_prediction() {
        let result = season(ReleasePattern::Unknown, d(2023, 3, 1), d(2023, 4, 19));
        assert_eq!(predict_next_release(&result, d(2024, 2, 1)), None);
    }

    #[test]
    fn test_prediction_later_this_year() {
        let result = season(ReleasePattern::Weekly, d(2023, 3, 1), d(2023, 4, 19));
        // 10 months after the finale, premiere anniversary still ahead
        assert_eq!(predict_next_release(&result, d(2024, 2, 20)), Some(d(2024, 3, 1)));
    }

    #[test]
    fn test_prediction_rolls_to_next_year() {
        let result = season(ReleasePattern::Binge, d(2023, 1, 10), d(2023, 1, 10));
        // 12 months later, the January date has already passed
        assert_eq!(predict_next_release(&result, d(2024, 1, 20)), Some(d(2025, 1, 10)));
    }

    #[test]
    fn test_outside_renewal_window() {
        let result = season(ReleasePattern::Weekly, d(2023, 3, 1), d(2023, 4, 19));
        assert_eq!(predict_next_release(&result, d(2023, 10, 1)), None);
        assert_eq!(predict_next_release(&result, d(2024, 9, 1)), None);
        assert_eq!(predict_next_release(&result, d(2023, 1, 1)), None);
    }

    #[test]
    fn test_window_edges() {
        let result = season(ReleasePattern::Weekly, d(2023, 6, 1), d(2023, 7, 15));
        // exactly 9 months
        assert!(predict_next_release(&result, d(2024, 4, 15)).is_some());
        // one day short of 9 months
        assert!(predict_next_release(&result, d(2024, 4, 14)).is_none());
        // 15 months and change
        assert!(predict_next_release(&result, d(2024, 10, 20)).is_some());
        assert!(predict_next_release(&result, d(2024, 11, 15)).is_none());
    }

    #[test]
    fn test_leap_day_start() {
        let result = season(ReleasePattern::Weekly, d(2024, 2, 29), d(2024, 4, 18));
        assert_eq!(predict_next_release(&result, d(2025, 1, 20)), Some(d(2025, 2, 28)));
    }
}
