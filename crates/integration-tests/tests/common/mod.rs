//! Shared fixtures: a SQLite store (in-memory, or a temp file with a real
//! connection pool), an in-process window counter and a manual clock wired
//! into a `RatingService`.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rr_core::models::{Content, ContentId, UserId};
use rr_core::traits::{RatingStore, WindowMode};
use rr_core::{AggregateCache, ManualClock, RatingService, VerificationEngine};
use rr_counter_memory::MemoryWindowCounter;
use rr_db_sqlite::SqliteRatingStore;
use tempfile::TempDir;

pub const WINDOW_MINUTES: i64 = 5;
pub const TTL_MINUTES: i64 = 5;

pub struct Harness {
    pub store: Arc<SqliteRatingStore>,
    pub counter: Arc<MemoryWindowCounter>,
    pub clock: Arc<ManualClock>,
    pub service: RatingService,
    /// Keeps the database file alive for file-backed harnesses.
    _dir: Option<TempDir>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_engine(VerificationEngine::default()).await
    }

    pub async fn with_engine(engine: VerificationEngine) -> Self {
        let store = SqliteRatingStore::in_memory().await.unwrap();
        Self::assemble(store, engine, None)
    }

    /// A database file with `connections` pooled connections, so concurrent
    /// submissions really contend for the SQLite write lock.
    pub async fn file_backed(connections: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ratings.db").display());
        let store = SqliteRatingStore::connect(&url, connections).await.unwrap();
        Self::assemble(store, VerificationEngine::default(), Some(dir))
    }

    fn assemble(store: SqliteRatingStore, engine: VerificationEngine, dir: Option<TempDir>) -> Self {
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let counter = Arc::new(MemoryWindowCounter::with_clock(
            Duration::minutes(WINDOW_MINUTES),
            WindowMode::Fixed,
            clock.clone(),
        ));
        let dyn_store: Arc<dyn RatingStore> = store.clone();
        let service = RatingService::new(
            dyn_store.clone(),
            counter.clone(),
            AggregateCache::new(dyn_store, Duration::minutes(TTL_MINUTES)),
            engine,
            clock.clone(),
        );
        Self {
            store,
            counter,
            clock,
            service,
            _dir: dir,
        }
    }

    pub async fn content(&self, n: usize) -> Content {
        self.service
            .create_content(
                &format!("Content Title {n}"),
                &format!("This is the text of content item {n}."),
            )
            .await
            .unwrap()
    }

    pub fn now(&self) -> DateTime<Utc> {
        use rr_core::Clock;
        self.clock.now()
    }

    /// Writes straight to the table, skipping verification and the counter.
    pub async fn insert_rating_directly(&self, user_id: UserId, content_id: ContentId, score: i64) {
        sqlx::query(
            "INSERT INTO rating (user_id, content_id, score, created_at, verified) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(user_id)
        .bind(content_id)
        .bind(score)
        .bind(self.now().timestamp_millis())
        .execute(self.store.pool())
        .await
        .unwrap();
    }

    /// Backdates the cached aggregate so the next read sees it as stale.
    pub async fn backdate_summary(&self, content_id: ContentId, by: Duration) {
        sqlx::query("UPDATE content SET cache_updated_at = ? WHERE id = ?")
            .bind((self.now() - by).timestamp_millis())
            .bind(content_id)
            .execute(self.store.pool())
            .await
            .unwrap();
    }

    pub async fn flags(&self, content_id: ContentId) -> Vec<bool> {
        self.service
            .list_ratings(content_id, None)
            .await
            .unwrap()
            .into_iter()
            .map(|rating| rating.verified)
            .collect()
    }
}
