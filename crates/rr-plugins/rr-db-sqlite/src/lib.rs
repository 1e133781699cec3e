//! # rr-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `rr-core` domain models. Timestamps are stored as Unix milliseconds
//! so window queries compare integers.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rr_core::error::{AppError, Result};
use rr_core::models::{
    Content, ContentId, ContentSummary, Rating, RatingSubmission, Score, ScoreHistogram,
    UpsertOutcome, UserId,
};
use rr_core::traits::RatingStore;
use rr_core::verification::VerificationEngine;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Decode, Row, Sqlite, Type};
use tracing::{debug, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const CONTENT_COLUMNS: &str =
    "id, title, text, cached_avg, cached_count, cache_updated_at, created_at";
const RATING_COLUMNS: &str = "user_id, content_id, score, created_at, verified";

pub struct SqliteRatingStore {
    pool: SqlitePool,
}

impl SqliteRatingStore {
    /// Connects with the default pool size and applies migrations.
    pub async fn new(url: &str) -> Result<Self> {
        Self::connect(url, 5).await
    }

    /// A private in-memory database, mainly for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(store_err)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to `:memory:` is its own database, so pin one.
        let in_memory = url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options.connect_with(options).await.map_err(store_err)?;
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|err| AppError::StoreUnavailable(format!("migration failed: {err}")))?;

        info!(url, in_memory, "rating store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Helpers for timestamp conversion
fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::Internal(format!("timestamp out of range: {ms}")))
}

fn store_err(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::ConstraintViolation(db.message().to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            AppError::Internal(err.to_string())
        }
        _ => AppError::StoreUnavailable(err.to_string()),
    }
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name).map_err(store_err)
}

fn score_col(row: &SqliteRow) -> Result<Score> {
    let raw: i64 = col(row, "score")?;
    Score::new(raw).map_err(|_| AppError::Internal(format!("stored score out of range: {raw}")))
}

fn content_from_row(row: &SqliteRow) -> Result<Content> {
    Ok(Content {
        id: col(row, "id")?,
        title: col(row, "title")?,
        text: col(row, "text")?,
        summary: summary_from_row(row)?,
        created_at: from_millis(col(row, "created_at")?)?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<ContentSummary> {
    Ok(ContentSummary {
        avg_rating: col(row, "cached_avg")?,
        rating_count: col::<i64>(row, "cached_count")?.max(0) as u64,
        last_refreshed: from_millis(col(row, "cache_updated_at")?)?,
    })
}

fn rating_from_row(row: &SqliteRow) -> Result<Rating> {
    Ok(Rating {
        user_id: col(row, "user_id")?,
        content_id: col(row, "content_id")?,
        score: score_col(row)?,
        created_at: from_millis(col(row, "created_at")?)?,
        verified: col(row, "verified")?,
    })
}

#[async_trait]
impl RatingStore for SqliteRatingStore {
    async fn create_content(&self, content: &Content) -> Result<()> {
        sqlx::query(
            "INSERT INTO content (id, title, text, cached_avg, cached_count, cache_updated_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(content.id)
        .bind(&content.title)
        .bind(&content.text)
        .bind(content.summary.avg_rating)
        .bind(content.summary.rating_count as i64)
        .bind(to_millis(content.summary.last_refreshed))
        .bind(to_millis(content.created_at))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<Content>> {
        let row = sqlx::query(&format!("SELECT {CONTENT_COLUMNS} FROM content WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.as_ref().map(content_from_row).transpose()
    }

    async fn list_contents(&self) -> Result<Vec<Content>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter().map(content_from_row).collect()
    }

    /// Read, aggregate and write happen in a single statement.
    async fn recompute_summary(&self, id: ContentId, now: DateTime<Utc>) -> Result<ContentSummary> {
        let row = sqlx::query(
            "UPDATE content SET \
                cached_avg = COALESCE((SELECT AVG(score) FROM rating WHERE content_id = ?), 0.0), \
                cached_count = (SELECT COUNT(*) FROM rating WHERE content_id = ?), \
                cache_updated_at = MAX(cache_updated_at, ?) \
             WHERE id = ? \
             RETURNING cached_avg, cached_count, cache_updated_at",
        )
        .bind(id)
        .bind(id)
        .bind(to_millis(now))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let summary = match row {
            Some(row) => summary_from_row(&row)?,
            None => return Err(AppError::content_not_found(id)),
        };
        debug!(
            content_id = %id,
            avg = summary.avg_rating,
            count = summary.rating_count,
            "summary recomputed"
        );
        Ok(summary)
    }

    /// Upsert, window read and flag write in one transaction.
    ///
    /// The transaction opens with a write so SQLite takes the write lock
    /// before the window is read; concurrent submissions serialize here.
    async fn upsert_rating(
        &self,
        submission: &RatingSubmission,
        engine: &VerificationEngine,
    ) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let inserted = sqlx::query(
            "INSERT INTO rating (user_id, content_id, score, created_at, verified) VALUES (?, ?, ?, ?, 0) \
             ON CONFLICT (user_id, content_id) DO NOTHING",
        )
        .bind(submission.user_id)
        .bind(submission.content_id)
        .bind(i64::from(submission.score))
        .bind(to_millis(submission.submitted_at))
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if matches!(&err, sqlx::Error::Database(db) if db.is_foreign_key_violation()) {
                AppError::content_not_found(submission.content_id)
            } else {
                store_err(err)
            }
        })?
        .rows_affected()
            == 1;

        if !inserted {
            let updated = sqlx::query("UPDATE rating SET score = ? WHERE user_id = ? AND content_id = ?")
                .bind(i64::from(submission.score))
                .bind(submission.user_id)
                .bind(submission.content_id)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?
                .rows_affected();
            if updated == 0 {
                return Err(AppError::ConstraintViolation(
                    "conflicting rating disappeared before update".into(),
                ));
            }
        }

        let since = to_millis(engine.window_start(submission.submitted_at));
        let rows = sqlx::query(
            "SELECT score, COUNT(*) AS n FROM rating WHERE content_id = ? AND created_at >= ? GROUP BY score",
        )
        .bind(submission.content_id)
        .bind(since)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_err)?;

        let mut recent = ScoreHistogram::default();
        for row in &rows {
            recent.record(score_col(row)?, col::<i64>(row, "n")?.max(0) as u64);
        }
        let verification = engine.evaluate(&recent);

        let row = sqlx::query(&format!(
            "UPDATE rating SET verified = ? WHERE user_id = ? AND content_id = ? RETURNING {RATING_COLUMNS}"
        ))
        .bind(verification.is_verified())
        .bind(submission.user_id)
        .bind(submission.content_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;
        let rating = rating_from_row(&row)?;

        tx.commit().await.map_err(store_err)?;

        debug!(
            content_id = %submission.content_id,
            user_id = %submission.user_id,
            recent = recent.total(),
            inserted,
            verification = verification.as_str(),
            "rating upserted"
        );
        Ok(UpsertOutcome {
            rating,
            created: inserted,
        })
    }

    async fn get_rating(&self, user_id: UserId, content_id: ContentId) -> Result<Option<Rating>> {
        let row = sqlx::query(&format!(
            "SELECT {RATING_COLUMNS} FROM rating WHERE user_id = ? AND content_id = ?"
        ))
        .bind(user_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.as_ref().map(rating_from_row).transpose()
    }

    async fn scores_by_user(&self, user_id: UserId) -> Result<HashMap<ContentId, Score>> {
        let rows = sqlx::query("SELECT content_id, score FROM rating WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        rows.iter()
            .map(|row| -> Result<(ContentId, Score)> {
                Ok((col(row, "content_id")?, score_col(row)?))
            })
            .collect()
    }

    async fn list_ratings(
        &self,
        content_id: ContentId,
        verified: Option<bool>,
    ) -> Result<Vec<Rating>> {
        let rows = sqlx::query(&format!(
            "SELECT {RATING_COLUMNS} FROM rating \
             WHERE content_id = ? AND (? IS NULL OR verified = ?) \
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(content_id)
        .bind(verified)
        .bind(verified)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter().map(rating_from_row).collect()
    }
}
