/// Release pattern detection and next-season prediction
///
/// The classifier looks at the gaps between consecutive air dates of one
/// season and decides whether the show drops weekly, all at once, or
/// somewhere in between.

pub mod classifier;
pub mod predictor;

pub use classifier::classify;
pub use predictor::predict_next_release;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a show releases its episodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePattern {
    Weekly,
    Binge,
    PremiereWeekly,
    Mixed,
    Unknown,
}

impl ReleasePattern {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReleasePattern::Weekly => "Weekly",
            ReleasePattern::Binge => "Binge drop",
            ReleasePattern::PremiereWeekly => "Premiere, then weekly",
            ReleasePattern::Mixed => "Mixed",
            ReleasePattern::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ReleasePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Statistics behind a verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatternDiagnostics {
    /// Gaps in days between consecutive air dates, in air-date order
    pub intervals: Vec<i64>,

    /// Mean gap in days
    pub mean_interval: f64,

    /// Population standard deviation of the gaps
    pub std_dev: f64,

    /// Which rule produced the verdict
    pub reasoning: String,
}

/// Classifier output for one show/season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasePatternResult {
    pub pattern: ReleasePattern,

    /// Always within `[0, 1]`
    pub confidence: f64,

    pub episode_interval_days: Option<i64>,

    pub season_start: Option<NaiveDate>,

    pub season_end: Option<NaiveDate>,

    /// Number of episodes with a known air date
    pub total_episodes: usize,

    pub diagnostics: PatternDiagnostics,
}

impl ReleasePatternResult {
    pub fn is_known(&self) -> bool {
        self.pattern != ReleasePattern::Unknown
    }
}
