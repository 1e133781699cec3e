//! # Rating Service
//!
//! Orchestrates rating submissions and content reads on top of the ports.
//! The window counter is only touched after the store transaction commits.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::AggregateCache;
use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::{
    Content, ContentId, ContentListing, ContentSummary, Rating, RatingSubmission, Score,
    SubmitOutcome, UserId, Verification,
};
use crate::traits::{RatingStore, WindowCounter};
use crate::verification::VerificationEngine;

pub struct RatingService {
    store: Arc<dyn RatingStore>,
    counter: Arc<dyn WindowCounter>,
    cache: AggregateCache,
    engine: VerificationEngine,
    clock: Arc<dyn Clock>,
}

impl RatingService {
    pub fn new(
        store: Arc<dyn RatingStore>,
        counter: Arc<dyn WindowCounter>,
        cache: AggregateCache,
        engine: VerificationEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            counter,
            cache,
            engine,
            clock,
        }
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    /// Validates, upserts and verifies a rating, then bumps the window counter.
    pub async fn submit_rating(
        &self,
        user_id: UserId,
        content_id: ContentId,
        raw_score: i64,
    ) -> Result<SubmitOutcome> {
        let score = Score::new(raw_score)?;

        let recent = self.recent_activity(content_id).await;
        if recent > self.engine.thresholds().max_recent {
            warn!(%content_id, recent, "rating spike in progress");
        }

        let submission = RatingSubmission {
            user_id,
            content_id,
            score,
            submitted_at: self.clock.now(),
        };

        let outcome = match self.store.upsert_rating(&submission, &self.engine).await {
            Err(AppError::ConstraintViolation(reason)) => {
                debug!(%content_id, %user_id, %reason, "duplicate insert race, retrying as update");
                self.store.upsert_rating(&submission, &self.engine).await?
            }
            other => other?,
        };

        // Committed. Everything below is best-effort.
        if let Err(err) = self.counter.increment(content_id).await {
            warn!(%content_id, error = %err, "window counter increment failed, ignoring");
        }

        let verification = Verification::from_flag(outcome.rating.verified);
        info!(
            %content_id,
            %user_id,
            score = %score,
            created = outcome.created,
            verification = verification.as_str(),
            "rating accepted"
        );

        Ok(SubmitOutcome {
            rating: outcome.rating,
            created: outcome.created,
            verification,
        })
    }

    /// Approximate count of ratings for the content item in the current
    /// window. Reads as zero when the counter backend is unavailable.
    pub async fn recent_activity(&self, content_id: ContentId) -> u64 {
        match self.counter.get(content_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(%content_id, error = %err, "window counter unavailable, failing open");
                0
            }
        }
    }

    /// Every content item with its (refreshed if stale) summary and the
    /// caller's own score.
    pub async fn list_content(&self, caller: Option<UserId>) -> Result<Vec<ContentListing>> {
        let now = self.clock.now();
        let contents = self.store.list_contents().await?;
        let own_scores = match caller {
            Some(user_id) => self.store.scores_by_user(user_id).await?,
            None => Default::default(),
        };

        let mut listings = Vec::with_capacity(contents.len());
        for content in &contents {
            let summary = self.cache.refresh_if_stale(content, now).await?;
            listings.push(ContentListing::new(
                content,
                summary,
                own_scores.get(&content.id).copied(),
            ));
        }
        Ok(listings)
    }

    pub async fn get_content(
        &self,
        caller: Option<UserId>,
        content_id: ContentId,
    ) -> Result<ContentListing> {
        let content = self
            .store
            .get_content(content_id)
            .await?
            .ok_or_else(|| AppError::content_not_found(content_id))?;
        let summary = self.cache.refresh_if_stale(&content, self.clock.now()).await?;
        let user_rating = match caller {
            Some(user_id) => self
                .store
                .get_rating(user_id, content_id)
                .await?
                .map(|rating| rating.score),
            None => None,
        };
        Ok(ContentListing::new(&content, summary, user_rating))
    }

    /// Forces a recomputation regardless of staleness.
    pub async fn refresh_summary(&self, content_id: ContentId) -> Result<ContentSummary> {
        self.cache.refresh(content_id, self.clock.now()).await
    }

    pub async fn list_ratings(
        &self,
        content_id: ContentId,
        verified: Option<bool>,
    ) -> Result<Vec<Rating>> {
        if self.store.get_content(content_id).await?.is_none() {
            return Err(AppError::content_not_found(content_id));
        }
        self.store.list_ratings(content_id, verified).await
    }

    pub async fn create_content(&self, title: &str, text: &str) -> Result<Content> {
        let content = Content::new(title, text, self.clock.now());
        self.store.create_content(&content).await?;
        info!(content_id = %content.id, title, "content created");
        Ok(content)
    }
}
