//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Content, ContentId, ContentSummary, Rating, RatingSubmission, Score, UpsertOutcome, UserId,
};
use crate::verification::VerificationEngine;

/// Authoritative persistence contract for content and ratings.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RatingStore: Send + Sync {
    // Content Operations
    async fn create_content(&self, content: &Content) -> Result<()>;
    async fn get_content(&self, id: ContentId) -> Result<Option<Content>>;
    async fn list_contents(&self) -> Result<Vec<Content>>;

    /// Recomputes avg/count over every rating of the content item and writes
    /// them with `last_refreshed = max(last_refreshed, now)` in one atomic step.
    async fn recompute_summary(&self, id: ContentId, now: DateTime<Utc>) -> Result<ContentSummary>;

    // Rating Operations

    /// Creates or updates the (user, content) rating, evaluates it with
    /// `engine` against the ratings created within the engine's window, and
    /// writes the verified flag, all inside one transaction.
    ///
    /// Fails with `ConstraintViolation` if a concurrent insert wins the
    /// unique-key race, and with `NotFound` if the content does not exist.
    async fn upsert_rating(
        &self,
        submission: &RatingSubmission,
        engine: &VerificationEngine,
    ) -> Result<UpsertOutcome>;

    async fn get_rating(&self, user_id: UserId, content_id: ContentId) -> Result<Option<Rating>>;

    /// Every score the user has given, keyed by content item.
    async fn scores_by_user(&self, user_id: UserId) -> Result<HashMap<ContentId, Score>>;

    /// Ratings of a content item, oldest first, optionally filtered by flag.
    async fn list_ratings(
        &self,
        content_id: ContentId,
        verified: Option<bool>,
    ) -> Result<Vec<Rating>>;
}

/// How a window counter treats the expiry of an existing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowMode {
    /// Expiry is set when the key is created and never extended.
    #[default]
    Fixed,
    /// Every increment pushes the expiry back to a full window.
    Sliding,
}

/// Approximate per-content activity counter backed by an expiring store.
///
/// Implementations report backend failures as `TransientStoreUnavailable`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WindowCounter: Send + Sync {
    /// Atomically increments the counter and returns the new value.
    async fn increment(&self, content_id: ContentId) -> Result<u64>;

    /// Current value; zero once the window has expired.
    async fn get(&self, content_id: ContentId) -> Result<u64>;
}

/// Identity contract. Token issuance lives outside the core.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthProvider: Send + Sync {
    /// Resolves a bearer credential to the caller's user id.
    fn resolve_caller(&self, token: &str) -> Option<UserId>;

    /// Whether the user may inspect individual ratings and their flags.
    fn is_moderator(&self, user_id: UserId) -> bool;
}
