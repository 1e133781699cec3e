//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Ratings.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

pub type ContentId = Uuid;
pub type UserId = Uuid;

/// A rating score, guaranteed to be within `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 5;

    pub fn new(raw: i64) -> Result<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&raw) {
            Ok(Score(raw as u8))
        } else {
            Err(AppError::InvalidScore(raw))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = AppError;

    fn try_from(raw: i64) -> Result<Self> {
        Score::new(raw)
    }
}

impl From<Score> for i64 {
    fn from(score: Score) -> i64 {
        score.0 as i64
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cached aggregate statistics for one content item.
///
/// Only ever produced by a full recomputation over the rating relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub avg_rating: f64,
    pub rating_count: u64,
    pub last_refreshed: DateTime<Utc>,
}

impl ContentSummary {
    /// Summary of a content item nobody has rated, refreshed at `at`.
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            avg_rating: 0.0,
            rating_count: 0,
            last_refreshed: at,
        }
    }

    /// Stale iff strictly more than `ttl` has elapsed since the last refresh.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_refreshed > ttl
    }
}

/// A rateable content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub title: String,
    pub text: String,
    pub summary: ContentSummary,
    pub created_at: DateTime<Utc>,
}

impl Content {
    /// New content starts with a summary refreshed at the Unix epoch, so the
    /// first read always recomputes it.
    pub fn new(title: impl Into<String>, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            text: text.into(),
            summary: ContentSummary::empty(DateTime::<Utc>::UNIX_EPOCH),
            created_at: now,
        }
    }
}

/// A user's rating of a content item. Unique per (user_id, content_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub score: Score,
    /// Set on first creation; resubmissions keep it.
    pub created_at: DateTime<Utc>,
    pub verified: bool,
}

/// Outcome of the verification heuristic for a single rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    Verified,
    Unverified,
}

impl Verification {
    pub fn from_flag(verified: bool) -> Self {
        if verified {
            Verification::Verified
        } else {
            Verification::Unverified
        }
    }

    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verification::Verified => "verified",
            Verification::Unverified => "unverified",
        }
    }
}

/// A validated rating submission, timestamped by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSubmission {
    pub user_id: UserId,
    pub content_id: ContentId,
    pub score: Score,
    pub submitted_at: DateTime<Utc>,
}

/// What the store reports back after a committed upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub rating: Rating,
    /// `true` if the row was inserted, `false` if an existing row was updated.
    pub created: bool,
}

/// What the service reports back after a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub rating: Rating,
    pub created: bool,
    pub verification: Verification,
}

/// Per-score counts of the ratings inside the verification window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreHistogram([u64; 6]);

impl ScoreHistogram {
    pub fn record(&mut self, score: Score, count: u64) {
        self.0[score.value() as usize] += count;
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Number of ratings with a score at or below `max`.
    pub fn at_most(&self, max: u8) -> u64 {
        self.0.iter().take(max as usize + 1).sum()
    }

    /// Number of ratings with a score at or above `min`.
    pub fn at_least(&self, min: u8) -> u64 {
        self.0.iter().skip(min as usize).sum()
    }
}

impl FromIterator<Score> for ScoreHistogram {
    fn from_iter<I: IntoIterator<Item = Score>>(iter: I) -> Self {
        let mut histogram = ScoreHistogram::default();
        for score in iter {
            histogram.record(score, 1);
        }
        histogram
    }
}

/// A content item as presented to a (possibly anonymous) caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentListing {
    pub id: ContentId,
    pub title: String,
    pub avg_rating: f64,
    pub rating_count: u64,
    /// The caller's own score, if authenticated and they rated this item.
    pub user_rating: Option<Score>,
}

impl ContentListing {
    pub fn new(content: &Content, summary: ContentSummary, user_rating: Option<Score>) -> Self {
        Self {
            id: content.id,
            title: content.title.clone(),
            avg_rating: summary.avg_rating,
            rating_count: summary.rating_count,
            user_rating,
        }
    }
}
