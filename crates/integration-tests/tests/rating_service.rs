mod common;

use chrono::Duration;
use common::Harness;
use rr_core::error::AppError;
use rr_core::models::{Score, UserId, Verification};

#[tokio::test]
async fn reference_scenario_flags_the_pile_on() {
    let h = Harness::new().await;
    let content = h.content(0).await;

    let u1 = UserId::now_v7();
    let outcome = h.service.submit_rating(u1, content.id, 5).await.unwrap();
    assert_eq!(outcome.verification, Verification::Verified);
    let summary = h.service.refresh_summary(content.id).await.unwrap();
    assert_eq!(summary.avg_rating, 5.0);
    assert_eq!(summary.rating_count, 1);

    let u2 = UserId::now_v7();
    h.service.submit_rating(u2, content.id, 5).await.unwrap();
    let summary = h.service.refresh_summary(content.id).await.unwrap();
    assert_eq!(summary.avg_rating, 5.0);
    assert_eq!(summary.rating_count, 2);

    // Ratings 3..=101, all zero.
    let mut outcomes = Vec::new();
    for _ in 3..=101 {
        outcomes.push(
            h.service
                .submit_rating(UserId::now_v7(), content.id, 0)
                .await
                .unwrap(),
        );
    }

    let flags = h.flags(content.id).await;
    assert_eq!(flags.len(), 101);
    // Low share is 3/5 at the fifth rating, which is not above 0.6.
    assert!(flags[..5].iter().all(|&verified| verified));
    assert!(flags[5..].iter().all(|&verified| !verified));
    assert_eq!(
        outcomes.last().unwrap().verification,
        Verification::Unverified
    );

    let histogram: rr_core::ScoreHistogram = h
        .service
        .list_ratings(content.id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|rating| rating.score)
        .collect();
    assert_eq!(
        h.service.engine().breach(&histogram),
        Some(rr_core::Breach::VolumeSpike)
    );
    assert_eq!(h.service.recent_activity(content.id).await, 101);
}

#[tokio::test]
async fn volume_spike_flags_from_the_101st_rating() {
    let h = Harness::new().await;
    let content = h.content(0).await;

    // Middling scores never trip the ratio rules.
    for n in 0..101 {
        h.service
            .submit_rating(UserId::now_v7(), content.id, 2 + (n % 2))
            .await
            .unwrap();
    }

    let flags = h.flags(content.id).await;
    assert!(flags[..100].iter().all(|&verified| verified));
    assert!(!flags[100]);
}

#[tokio::test]
async fn low_score_pile_on_is_unverified() {
    let h = Harness::new().await;
    let content = h.content(0).await;

    for _ in 0..50 {
        h.service
            .submit_rating(UserId::now_v7(), content.id, 1)
            .await
            .unwrap();
    }

    let flags = h.flags(content.id).await;
    assert_eq!(flags.len(), 50);
    assert!(flags[..4].iter().all(|&verified| verified));
    assert!(flags[4..].iter().all(|&verified| !verified));

    let unverified = h
        .service
        .list_ratings(content.id, Some(false))
        .await
        .unwrap();
    assert_eq!(unverified.len(), 46);
}

#[tokio::test]
async fn ratings_outside_the_window_do_not_count() {
    let h = Harness::new().await;
    let content = h.content(0).await;

    for _ in 0..4 {
        h.service
            .submit_rating(UserId::now_v7(), content.id, 0)
            .await
            .unwrap();
    }
    h.clock.advance(Duration::minutes(6));

    let outcome = h
        .service
        .submit_rating(UserId::now_v7(), content.id, 0)
        .await
        .unwrap();
    assert_eq!(outcome.verification, Verification::Verified);
    assert_eq!(h.service.recent_activity(content.id).await, 1);
}

#[tokio::test]
async fn stale_summary_picks_up_direct_writes() {
    let h = Harness::new().await;
    let content = h.content(0).await;
    let rater = UserId::now_v7();

    h.service.submit_rating(rater, content.id, 4).await.unwrap();
    h.service.refresh_summary(content.id).await.unwrap();

    h.backdate_summary(content.id, Duration::minutes(10)).await;
    h.insert_rating_directly(UserId::now_v7(), content.id, 2).await;

    let listing = h.service.get_content(Some(rater), content.id).await.unwrap();
    assert_eq!(listing.rating_count, 2);
    assert_eq!(listing.avg_rating, 3.0);
    assert_eq!(listing.user_rating, Some(Score::new(4).unwrap()));
}

#[tokio::test]
async fn fresh_summary_is_served_from_cache() {
    let h = Harness::new().await;
    let content = h.content(0).await;

    h.service
        .submit_rating(UserId::now_v7(), content.id, 4)
        .await
        .unwrap();
    h.service.refresh_summary(content.id).await.unwrap();
    h.insert_rating_directly(UserId::now_v7(), content.id, 0).await;

    h.clock.advance(Duration::minutes(common::TTL_MINUTES - 1));
    let listing = h.service.get_content(None, content.id).await.unwrap();
    assert_eq!(listing.rating_count, 1);

    h.clock.advance(Duration::minutes(2));
    let listing = h.service.get_content(None, content.id).await.unwrap();
    assert_eq!(listing.rating_count, 2);
    assert_eq!(listing.avg_rating, 2.0);
}

#[tokio::test]
async fn back_to_back_refreshes_agree() {
    let h = Harness::new().await;
    let content = h.content(0).await;
    for score in [1, 4, 5] {
        h.service
            .submit_rating(UserId::now_v7(), content.id, score)
            .await
            .unwrap();
    }

    let first = h.service.refresh_summary(content.id).await.unwrap();
    let second = h.service.refresh_summary(content.id).await.unwrap();
    assert_eq!(first.avg_rating, second.avg_rating);
    assert_eq!(first.rating_count, second.rating_count);
    assert!((first.avg_rating - 10.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn every_valid_score_round_trips() {
    let h = Harness::new().await;
    let content = h.content(0).await;
    let rater = UserId::now_v7();

    for raw in 0..=5 {
        h.service.submit_rating(rater, content.id, raw).await.unwrap();
        let listing = h.service.get_content(Some(rater), content.id).await.unwrap();
        assert_eq!(listing.user_rating, Some(Score::new(raw).unwrap()));
    }
    assert_eq!(h.service.list_ratings(content.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn resubmission_keeps_the_original_timestamp() {
    let h = Harness::new().await;
    let content = h.content(0).await;
    let rater = UserId::now_v7();

    let first = h.service.submit_rating(rater, content.id, 1).await.unwrap();
    assert!(first.created);
    h.clock.advance(Duration::minutes(1));
    let second = h.service.submit_rating(rater, content.id, 3).await.unwrap();
    assert!(!second.created);
    assert_eq!(
        second.rating.created_at.timestamp_millis(),
        first.rating.created_at.timestamp_millis()
    );
    assert_eq!(second.rating.score, Score::new(3).unwrap());
}

#[tokio::test]
async fn invalid_scores_create_no_rows() {
    let h = Harness::new().await;
    let content = h.content(0).await;

    for raw in [6, -1] {
        let err = h
            .service
            .submit_rating(UserId::now_v7(), content.id, raw)
            .await
            .unwrap_err();
        assert_eq!(err, AppError::InvalidScore(raw));
    }
    assert!(h.service.list_ratings(content.id, None).await.unwrap().is_empty());
    assert_eq!(h.service.recent_activity(content.id).await, 0);
}

#[tokio::test]
async fn unknown_content_is_not_found() {
    let h = Harness::new().await;
    let missing = uuid::Uuid::now_v7();

    let err = h
        .service
        .submit_rating(UserId::now_v7(), missing, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(..)));
    assert!(matches!(
        h.service.list_ratings(missing, None).await,
        Err(AppError::NotFound(..))
    ));
}

#[tokio::test]
async fn counter_outage_does_not_block_submissions() {
    use std::sync::Arc;

    use rr_core::traits::{MockWindowCounter, RatingStore};
    use rr_core::{AggregateCache, ManualClock, RatingService, VerificationEngine};
    use rr_db_sqlite::SqliteRatingStore;
    use tokio_test::{assert_err, assert_ok};

    let store: Arc<dyn RatingStore> = Arc::new(SqliteRatingStore::in_memory().await.unwrap());
    let mut counter = MockWindowCounter::new();
    counter
        .expect_get()
        .returning(|_| Err(AppError::TransientStoreUnavailable("connection refused".into())));
    counter
        .expect_increment()
        .times(1)
        .returning(|_| Err(AppError::TransientStoreUnavailable("connection refused".into())));
    let service = RatingService::new(
        store.clone(),
        Arc::new(counter),
        AggregateCache::new(store, Duration::minutes(5)),
        VerificationEngine::default(),
        Arc::new(ManualClock::new(chrono::Utc::now())),
    );
    let content = service.create_content("Title", "text").await.unwrap();

    let outcome = assert_ok!(service.submit_rating(UserId::now_v7(), content.id, 3).await);
    assert_eq!(outcome.verification, Verification::Verified);
    assert_eq!(service.recent_activity(content.id).await, 0);
    assert_err!(service.submit_rating(UserId::now_v7(), content.id, 9).await);
}
