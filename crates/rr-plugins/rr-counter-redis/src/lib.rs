//! # rr-counter-redis
//!
//! Redis-backed `WindowCounter`. The window lives in the key's TTL, so the
//! counter self-expires even if nothing ever resets it.
//!
//! An increment is a single `MULTI`/`EXEC` block:
//!
//! ```text
//! SET key 0 EX <window> NX   -- create with expiry only if absent
//! EXPIRE key <window>        -- sliding mode only
//! INCR key                   -- keeps the TTL
//! ```

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands, RedisError};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use rr_core::error::{AppError, Result};
use rr_core::models::ContentId;
use rr_core::traits::{WindowCounter, WindowMode};
use tracing::info;

pub const DEFAULT_PREFIX: &str = "rr:recent";

pub struct RedisWindowCounter {
    pool: Pool,
    prefix: String,
    window_secs: u64,
    mode: WindowMode,
}

fn unavailable(err: impl std::fmt::Display) -> AppError {
    AppError::TransientStoreUnavailable(err.to_string())
}

impl RedisWindowCounter {
    /// Builds the pool lazily; no connection is made until first use.
    pub fn connect(redis_url: &str, window_secs: u64, mode: WindowMode) -> Result<Self> {
        Self::connect_with_prefix(redis_url, DEFAULT_PREFIX, window_secs, mode)
    }

    pub fn connect_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
        window_secs: u64,
        mode: WindowMode,
    ) -> Result<Self> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(unavailable)?;
        let prefix = prefix.into();
        info!(%prefix, window_secs, ?mode, "redis window counter configured");
        Ok(Self {
            pool,
            prefix,
            window_secs: window_secs.max(1),
            mode,
        })
    }

    fn key(&self, content_id: ContentId) -> String {
        format!("{}:{}", self.prefix, content_id)
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(unavailable)
    }

    fn increment_pipeline(&self, key: &str) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("EX")
            .arg(self.window_secs)
            .arg("NX")
            .ignore();
        if self.mode == WindowMode::Sliding {
            pipe.cmd("EXPIRE").arg(key).arg(self.window_secs).ignore();
        }
        pipe.cmd("INCR").arg(key);
        pipe
    }
}

#[async_trait]
impl WindowCounter for RedisWindowCounter {
    async fn increment(&self, content_id: ContentId) -> Result<u64> {
        let key = self.key(content_id);
        let mut conn = self.conn().await?;
        let (count,): (u64,) = self
            .increment_pipeline(&key)
            .query_async(&mut conn)
            .await
            .map_err(|err: RedisError| unavailable(err))?;
        Ok(count)
    }

    async fn get(&self, content_id: ContentId) -> Result<u64> {
        let key = self.key(content_id);
        let mut conn = self.conn().await?;
        let count: Option<u64> = conn.get(&key).await.map_err(unavailable)?;
        Ok(count.unwrap_or(0))
    }
}
