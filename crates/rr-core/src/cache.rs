//! # Aggregate Cache
//!
//! Staleness-bounded average/count per content item. Values are at most one
//! TTL out of date. Refreshes take no lock: two callers may both recompute,
//! and since recomputation is deterministic the last writer wins harmlessly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::Result;
use crate::models::{Content, ContentId, ContentSummary};
use crate::traits::RatingStore;

pub const DEFAULT_TTL_SECS: i64 = 300;

#[derive(Clone)]
pub struct AggregateCache {
    store: Arc<dyn RatingStore>,
    ttl: Duration,
}

impl AggregateCache {
    pub fn new(store: Arc<dyn RatingStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached summary, recomputing it first if it is stale.
    pub async fn refresh_if_stale(
        &self,
        content: &Content,
        now: DateTime<Utc>,
    ) -> Result<ContentSummary> {
        if !content.summary.is_stale(now, self.ttl) {
            return Ok(content.summary);
        }
        debug!(
            content_id = %content.id,
            last_refreshed = %content.summary.last_refreshed,
            "aggregate cache stale, recomputing"
        );
        self.refresh(content.id, now).await
    }

    /// Unconditional recomputation.
    pub async fn refresh(&self, id: ContentId, now: DateTime<Utc>) -> Result<ContentSummary> {
        self.store.recompute_summary(id, now).await
    }
}
