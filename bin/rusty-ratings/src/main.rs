//! # Rusty-Ratings Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod logging;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use chrono::Duration;
use configs::{AppConfig, CounterBackend};
use rr_api::handlers::AppState;
use rr_api::metrics::Metrics;
use rr_api::middleware::{cors_policy, request_logger};
use rr_core::traits::{RatingStore, WindowCounter, WindowMode};
use rr_core::{AggregateCache, RatingService, SystemClock, VerificationEngine, VerificationThresholds};
use secrecy::ExposeSecret;
use tracing::info;

// Feature-gated imports
#[cfg(feature = "db-sqlite")]
use rr_db_sqlite::SqliteRatingStore;

#[cfg(feature = "counter-memory")]
use rr_counter_memory::MemoryWindowCounter;

#[cfg(feature = "counter-redis")]
use rr_counter_redis::RedisWindowCounter;

#[cfg(feature = "auth-simple")]
use rr_auth_simple::SimpleAuthProvider;

#[cfg(not(feature = "db-sqlite"))]
compile_error!("rusty-ratings needs a rating store plugin; enable `db-sqlite`");

#[cfg(not(feature = "auth-simple"))]
compile_error!("rusty-ratings needs an auth plugin; enable `auth-simple`");

fn window_mode(mode: configs::WindowMode) -> WindowMode {
    match mode {
        configs::WindowMode::Fixed => WindowMode::Fixed,
        configs::WindowMode::Sliding => WindowMode::Sliding,
    }
}

fn thresholds(config: &AppConfig) -> VerificationThresholds {
    let v = &config.verification;
    VerificationThresholds {
        max_recent: v.max_recent,
        min_ratio_sample: v.min_ratio_sample,
        low_score_max: v.low_score_max,
        high_score_min: v.high_score_min,
        low_ratio: v.low_ratio,
        high_ratio: v.high_ratio,
    }
}

fn build_counter(config: &AppConfig) -> anyhow::Result<Arc<dyn WindowCounter>> {
    let counter = &config.counter;
    let mode = window_mode(counter.mode);

    match counter.backend {
        #[cfg(feature = "counter-memory")]
        CounterBackend::Memory => Ok(Arc::new(MemoryWindowCounter::new(
            Duration::seconds(counter.window_secs as i64),
            mode,
        ))),
        #[cfg(feature = "counter-redis")]
        CounterBackend::Redis => {
            let url = counter
                .redis_url
                .as_deref()
                .context("counter.redis_url is required for the redis backend")?;
            Ok(Arc::new(RedisWindowCounter::connect_with_prefix(
                url,
                counter.key_prefix.clone(),
                counter.window_secs,
                mode,
            )?))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("counter backend {other:?} was not compiled in"),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    logging::init_tracing(&config);

    // 1. Initialize the rating store
    let store: Arc<dyn RatingStore> = Arc::new(
        SqliteRatingStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("failed to open the rating store")?,
    );

    // 2. Initialize the window counter
    let counter = build_counter(&config)?;

    // 3. Initialize auth
    let auth = SimpleAuthProvider::new(config.auth.secret.expose_secret())
        .with_moderators(config.auth.moderators.iter().copied());
    info!(moderators = config.auth.moderators.len(), "auth provider ready");

    // 4. Wire the service
    let window = Duration::seconds(config.counter.window_secs as i64);
    let service = RatingService::new(
        store.clone(),
        counter,
        AggregateCache::new(store, Duration::seconds(config.cache.ttl_secs as i64)),
        VerificationEngine::new(thresholds(&config), window),
        Arc::new(SystemClock),
    );

    let state = web::Data::new(AppState {
        service,
        auth: Box::new(auth),
        metrics: Metrics::new(),
    });

    let (host, port) = config.bind_addr();
    info!(
        %host,
        port,
        counter = ?config.counter.backend,
        mode = ?config.counter.mode,
        "rusty-ratings starting"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_policy())
            .wrap(request_logger())
            .configure(rr_api::configure_routes)
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}
