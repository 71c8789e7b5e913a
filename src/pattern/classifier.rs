/// Statistical release-pattern classifier
use super::{PatternDiagnostics, ReleasePattern, ReleasePatternResult};
use chrono::NaiveDate;
use guide_core::EpisodeRecord;
use tracing::debug;

/// Gap considered "a week" and the tolerance around it
const WEEK_DAYS: i64 = 7;
const WEEK_TOLERANCE_DAYS: i64 = 2;

/// Share of near-weekly gaps that makes a weekly verdict on its own
const WEEKLY_RATIO_THRESHOLD: f64 = 0.6;

/// Spread above which gaps are too irregular to call weekly
const WEEKLY_MAX_STD_DEV: f64 = 3.5;

/// Share of 0-1 day gaps that makes a binge verdict
const BINGE_RATIO_THRESHOLD: f64 = 0.7;

const WEEKLY_BASE_CONFIDENCE: f64 = 0.6;
const MAX_CONFIDENCE: f64 = 0.95;
const MIXED_CONFIDENCE: f64 = 0.5;

/// Classify how a season releases its episodes.
///
/// Input order does not matter. Records without an air date are ignored;
/// fewer than two dated records is always `Unknown` with confidence 0.
pub fn classify(episodes: &[EpisodeRecord]) -> ReleasePatternResult {
    let mut dates: Vec<NaiveDate> = episodes.iter().filter_map(|e| e.air_date).collect();
    dates.sort();

    let season_start = dates.first().copied();
    let season_end = dates.last().copied();
    let total_episodes = dates.len();

    if dates.len() < 2 {
        return ReleasePatternResult {
            pattern: ReleasePattern::Unknown,
            confidence: 0.0,
            episode_interval_days: None,
            season_start,
            season_end,
            total_episodes,
            diagnostics: PatternDiagnostics {
                reasoning: format!("Only {} dated episode(s); need at least 2", total_episodes),
                ..Default::default()
            },
        };
    }

    let intervals: Vec<i64> = dates.windows(2).map(|w| (w[1] - w[0]).num_days()).collect();
    let count = intervals.len() as f64;

    let near_weekly = intervals
        .iter()
        .filter(|&&gap| (gap - WEEK_DAYS).abs() <= WEEK_TOLERANCE_DAYS)
        .count();
    let same_day = intervals.iter().filter(|&&gap| gap == 0).count();
    let short_gap = intervals.iter().filter(|&&gap| gap <= 1).count();

    let mean = intervals.iter().sum::<i64>() as f64 / count;
    let variance = intervals
        .iter()
        .map(|&gap| {
            let delta = gap as f64 - mean;
            delta * delta
        })
        .sum::<f64>()
        / count;
    let std_dev = variance.sqrt();

    let near_weekly_ratio = near_weekly as f64 / count;
    let short_gap_ratio = short_gap as f64 / count;

    let ratio_weekly = near_weekly_ratio >= WEEKLY_RATIO_THRESHOLD;
    let premiere_exception = same_day <= 1 && near_weekly >= 1usize.max(intervals.len().saturating_sub(2));
    let steady = std_dev <= WEEKLY_MAX_STD_DEV;

    let single_drop_date = dates.first() == dates.last();

    let (pattern, confidence, episode_interval_days, reasoning) = if (ratio_weekly || premiere_exception) && steady {
        let confidence = (WEEKLY_BASE_CONFIDENCE + 0.4 * near_weekly_ratio).min(MAX_CONFIDENCE);
        if ratio_weekly {
            (
                ReleasePattern::Weekly,
                confidence,
                Some(mean.round() as i64),
                format!(
                    "{}/{} gaps within {}±{} days (std dev {:.2})",
                    near_weekly,
                    intervals.len(),
                    WEEK_DAYS,
                    WEEK_TOLERANCE_DAYS,
                    std_dev
                ),
            )
        } else {
            (
                ReleasePattern::PremiereWeekly,
                confidence,
                Some(mean.round() as i64),
                format!(
                    "Premiere drop followed by {} weekly gap(s) (std dev {:.2})",
                    near_weekly, std_dev
                ),
            )
        }
    } else if short_gap_ratio >= BINGE_RATIO_THRESHOLD || single_drop_date {
        (
            ReleasePattern::Binge,
            MAX_CONFIDENCE,
            None,
            if single_drop_date {
                format!("All {} episodes share one air date", total_episodes)
            } else {
                format!("{}/{} gaps of a day or less", short_gap, intervals.len())
            },
        )
    } else {
        (
            ReleasePattern::Mixed,
            MIXED_CONFIDENCE,
            Some(mean.round() as i64),
            format!(
                "No consistent cadence: mean gap {:.1} days, std dev {:.2}",
                mean, std_dev
            ),
        )
    };

    debug!(
        "Classified {} dated episodes as {:?} ({:.2})",
        total_episodes, pattern, confidence
    );

    ReleasePatternResult {
        pattern,
        confidence: confidence.clamp(0.0, 1.0),
        episode_interval_days,
        season_start,
        season_end,
        total_episodes,
        diagnostics: PatternDiagnostics {
            intervals,
            mean_interval: mean,
            std_dev,
            reasoning,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guide_core::ShowId;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn episodes_at(start: NaiveDate, offsets: &[i64]) -> Vec<EpisodeRecord> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &offset)| {
                EpisodeRecord::new(
                    ShowId(1),
                    1,
                    i as u32 + 1,
                    guide_core::dates::shift_days(start, offset),
                    format!("Episode {}", i + 1),
                )
            })
            .collect()
    }

    #[test]
    fn test_degenerate_input_is_unknown() {
        let empty = classify(&[]);
        assert_eq!(empty.pattern, ReleasePattern::Unknown);
        assert_eq!(empty.confidence, 0.0);
        assert!(empty.diagnostics.intervals.is_empty());

        let one = classify(&episodes_at(d(2024, 1, 1), &[0]));
        assert_eq!(one.pattern, ReleasePattern::Unknown);
        assert_eq!(one.confidence, 0.0);
        assert_eq!(one.total_episodes, 1);
        assert_eq!(one.season_start, Some(d(2024, 1, 1)));
    }

    #[test]
    fn test_undated_episodes_are_ignored() {
        let mut episodes = episodes_at(d(2024, 1, 1), &[0]);
        episodes.push(EpisodeRecord::undated(ShowId(1), 1, 2, "TBA"));
        episodes.push(EpisodeRecord::undated(ShowId(1), 1, 3, "TBA"));
        let result = classify(&episodes);
        assert_eq!(result.pattern, ReleasePattern::Unknown);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_fixed_weekly_cadence() {
        for n in 3..10 {
            let offsets: Vec<i64> = (0..n).map(|i| i * 7).collect();
            let result = classify(&episodes_at(d(2024, 3, 4), &offsets));
            assert_eq!(result.pattern, ReleasePattern::Weekly);
            assert_eq!(result.confidence, 0.95);
            assert_eq!(result.episode_interval_days, Some(7));
            assert_eq!(result.diagnostics.intervals.len(), n as usize - 1);
        }
    }

    #[test]
    fn test_unsorted_input() {
        let mut episodes = episodes_at(d(2024, 3, 4), &[0, 7, 14, 21]);
        episodes.reverse();
        let result = classify(&episodes);
        assert_eq!(result.pattern, ReleasePattern::Weekly);
        assert_eq!(result.diagnostics.intervals, vec![7, 7, 7]);
        assert_eq!(result.season_start, Some(d(2024, 3, 4)));
        assert_eq!(result.season_end, Some(d(2024, 3, 25)));
    }

    #[test]
    fn test_single_date_binge() {
        for n in 2..8 {
            let offsets = vec![0; n];
            let result = classify(&episodes_at(d(2024, 7, 12), &offsets));
            assert_eq!(result.pattern, ReleasePattern::Binge);
            assert_eq!(result.confidence, 0.95);
            assert_eq!(result.total_episodes, n);
        }
    }

    #[test]
    fn test_premiere_double_drop_then_weekly() {
        let result = classify(&episodes_at(d(2024, 9, 1), &[0, 0, 7, 14]));
        assert_eq!(result.diagnostics.intervals, vec![0, 7, 7]);
        assert_eq!(result.pattern, ReleasePattern::Weekly);
        assert!((result.confidence - (0.6 + 0.4 * 2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_premiere_exception_only() {
        // gaps [0, 1, 7, 7]: ratio 0.5 fails, premiere exception carries it
        let result = classify(&episodes_at(d(2024, 9, 1), &[0, 0, 1, 8, 15]));
        assert_eq!(result.pattern, ReleasePattern::PremiereWeekly);
        assert!((result.confidence - 0.8).abs() < 1e-9);
        assert!((result.diagnostics.std_dev - 3.25).abs() < 1e-9);
    }

    #[test]
    fn test_mostly_same_day_is_binge() {
        let result = classify(&episodes_at(d(2024, 9, 1), &[0, 0, 0, 0, 7]));
        assert_eq!(result.pattern, ReleasePattern::Binge);
    }

    #[test]
    fn test_irregular_is_mixed() {
        let result = classify(&episodes_at(d(2024, 1, 1), &[0, 3, 17, 47]));
        assert_eq!(result.pattern, ReleasePattern::Mixed);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.episode_interval_days, Some(16));
        assert_eq!(result.season_end, Some(d(2024, 2, 17)));
    }

    #[test]
    fn test_wide_spread_weekly_rejected() {
        // 3 of 4 gaps near-weekly, but the 30-day hiatus pushes std dev past the limit
        let result = classify(&episodes_at(d(2024, 1, 1), &[0, 7, 14, 21, 51]));
        assert_ne!(result.pattern, ReleasePattern::Weekly);
        assert!(result.diagnostics.std_dev > 3.5);
    }
}
