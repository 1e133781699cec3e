//! Populates the configured database with sample content, users and ratings,
//! refreshes every aggregate and prints a token per user.
//!
//! Usage: `seed [CONTENTS] [USERS]` (defaults 5 and 10).

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use configs::AppConfig;
use rr_auth_simple::SimpleAuthProvider;
use rr_core::traits::{RatingStore, WindowMode};
use rr_core::{AggregateCache, RatingService, SystemClock, VerificationEngine};
use rr_counter_memory::MemoryWindowCounter;
use rr_db_sqlite::SqliteRatingStore;
use secrecy::ExposeSecret;
use tracing::info;
use uuid::Uuid;

const SAMPLE_TEXT: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit.";

fn arg_or(index: usize, default: usize) -> anyhow::Result<usize> {
    match std::env::args().nth(index) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("argument {index} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

/// Spread of scores without a RNG: stable across runs for the same sizes.
fn sample_score(user: usize, content: usize) -> i64 {
    ((user * 7 + content * 3 + user * content) % 6) as i64
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let contents = arg_or(1, 5)?;
    let users = arg_or(2, 10)?;
    let config = AppConfig::load().context("failed to load configuration")?;

    let store: Arc<dyn RatingStore> = Arc::new(
        SqliteRatingStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("failed to open the rating store")?,
    );
    // Verification is relaxed to spike-only so sample data lands verified.
    let window = Duration::seconds(config.counter.window_secs as i64);
    let engine = VerificationEngine::new(
        rr_core::VerificationThresholds {
            low_ratio: 1.0,
            high_ratio: 1.0,
            ..Default::default()
        },
        window,
    );
    let service = RatingService::new(
        store.clone(),
        Arc::new(MemoryWindowCounter::new(window, WindowMode::Fixed)),
        AggregateCache::new(store, Duration::seconds(config.cache.ttl_secs as i64)),
        engine,
        Arc::new(SystemClock),
    );
    let auth = SimpleAuthProvider::new(config.auth.secret.expose_secret());

    let mut content_ids = Vec::with_capacity(contents);
    for n in 1..=contents {
        let content = service
            .create_content(&format!("Sample content #{n}"), SAMPLE_TEXT)
            .await?;
        content_ids.push(content.id);
    }

    let user_ids: Vec<Uuid> = (0..users).map(|_| Uuid::now_v7()).collect();
    let mut submitted = 0usize;
    for (u, user_id) in user_ids.iter().enumerate() {
        for (c, content_id) in content_ids.iter().enumerate() {
            service
                .submit_rating(*user_id, *content_id, sample_score(u, c))
                .await?;
            submitted += 1;
        }
    }

    for content_id in &content_ids {
        let summary = service.refresh_summary(*content_id).await?;
        info!(
            %content_id,
            avg_rating = summary.avg_rating,
            rating_count = summary.rating_count,
            "aggregate refreshed"
        );
    }
    info!(contents, users, submitted, "seed complete");

    for user_id in &user_ids {
        println!("{user_id}\t{}", auth.issue_token(*user_id));
    }
    Ok(())
}
