//! # Rating Verification
//!
//! Deterministic spam heuristic over the score distribution of the ratings a
//! content item received within the trailing window. A rating is flagged
//! unverified on a volume spike or when low or high scores dominate the window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ScoreHistogram, Verification};

/// Tunable thresholds. The defaults are the ratio-based reference policy;
/// setting both ratios to `1.0` reduces it to spike detection only.
///
/// `min_ratio_sample = 1` applies the ratio rules to any non-empty window,
/// so a lone low or high rating is already flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationThresholds {
    /// More ratings than this inside the window is a volume spike.
    pub max_recent: u64,
    /// Ratio rules only apply once the window holds this many ratings.
    pub min_ratio_sample: u64,
    /// Scores at or below this count as low.
    pub low_score_max: u8,
    /// Scores at or above this count as high.
    pub high_score_min: u8,
    pub low_ratio: f64,
    pub high_ratio: f64,
}

impl Default for VerificationThresholds {
    fn default() -> Self {
        Self {
            max_recent: 100,
            min_ratio_sample: 5,
            low_score_max: 1,
            high_score_min: 4,
            low_ratio: 0.6,
            high_ratio: 0.6,
        }
    }
}

/// Which rule, if any, flagged a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    VolumeSpike,
    LowScorePileOn,
    HighScorePileOn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationEngine {
    thresholds: VerificationThresholds,
    window: Duration,
}

impl VerificationEngine {
    pub fn new(thresholds: VerificationThresholds, window: Duration) -> Self {
        Self { thresholds, window }
    }

    pub fn thresholds(&self) -> &VerificationThresholds {
        &self.thresholds
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Earliest `created_at` that still counts as recent at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn evaluate(&self, recent: &ScoreHistogram) -> Verification {
        match self.breach(recent) {
            Some(_) => Verification::Unverified,
            None => Verification::Verified,
        }
    }

    /// First rule the window breaches, checked in order volume, low, high.
    pub fn breach(&self, recent: &ScoreHistogram) -> Option<Breach> {
        let t = &self.thresholds;
        let total = recent.total();
        if total == 0 {
            return None;
        }
        if total > t.max_recent {
            return Some(Breach::VolumeSpike);
        }
        if total < t.min_ratio_sample {
            return None;
        }

        let share = |n: u64| n as f64 / total as f64;
        if share(recent.at_most(t.low_score_max)) > t.low_ratio {
            return Some(Breach::LowScorePileOn);
        }
        if share(recent.at_least(t.high_score_min)) > t.high_ratio {
            return Some(Breach::HighScorePileOn);
        }
        None
    }
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new(VerificationThresholds::default(), Duration::minutes(5))
    }
}
