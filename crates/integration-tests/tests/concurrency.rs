mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use common::Harness;
use rr_core::models::UserId;

/// Pooled connections for the file-backed runs.
const CONNECTIONS: u32 = 4;

async fn raters_all_land(h: Arc<Harness>, raters: i64) {
    let content_id = h.content(0).await.id;

    let mut handles = Vec::new();
    for n in 0..raters {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.service
                .submit_rating(UserId::now_v7(), content_id, n % 6)
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().created);
    }

    let expected = raters as u64;
    assert_eq!(
        h.service.list_ratings(content_id, None).await.unwrap().len() as u64,
        expected
    );
    assert_eq!(h.service.recent_activity(content_id).await, expected);
    let summary = h.service.refresh_summary(content_id).await.unwrap();
    assert_eq!(summary.rating_count, expected);
}

async fn resubmissions_keep_one_row(h: Arc<Harness>, attempts: i64) {
    let content_id = h.content(0).await.id;
    let rater = UserId::now_v7();

    let mut handles = Vec::new();
    for n in 0..attempts {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.service.submit_rating(rater, content_id, n % 6).await
        }));
    }
    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    let ratings = h.service.list_ratings(content_id, None).await.unwrap();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].user_id, rater);
    assert_eq!(h.service.recent_activity(content_id).await, attempts as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_raters_all_land() {
    raters_all_land(Arc::new(Harness::new().await), 40).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_raters_all_land_on_a_pooled_file() {
    raters_all_land(Arc::new(Harness::file_backed(CONNECTIONS).await), 100).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resubmissions_keep_one_row() {
    resubmissions_keep_one_row(Arc::new(Harness::new().await), 20).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resubmissions_keep_one_row_on_a_pooled_file() {
    resubmissions_keep_one_row(Arc::new(Harness::file_backed(CONNECTIONS).await), 50).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_content_items_do_not_interfere() {
    let h = Arc::new(Harness::file_backed(CONNECTIONS).await);
    let a = h.content(0).await;
    let b = h.content(1).await;

    let mut handles = Vec::new();
    for n in 0..30 {
        let h = h.clone();
        let target = if n % 2 == 0 { a.id } else { b.id };
        handles.push(tokio::spawn(async move {
            h.service.submit_rating(UserId::now_v7(), target, 3).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.service.recent_activity(a.id).await, 15);
    assert_eq!(h.service.recent_activity(b.id).await, 15);
    assert!(h.flags(a.id).await.iter().all(|&verified| verified));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_submission_leaves_no_row_and_no_count() {
    let h = Harness::file_backed(2).await;
    let content_id = h.content(0).await.id;

    // Another writer holds the write lock, so the rating insert waits inside
    // its transaction until the submission is dropped.
    let mut writer = h.store.pool().begin().await.unwrap();
    sqlx::query("UPDATE content SET title = title WHERE id = ?")
        .bind(content_id)
        .execute(&mut *writer)
        .await
        .unwrap();

    let attempt = tokio::time::timeout(
        StdDuration::from_millis(200),
        h.service.submit_rating(UserId::now_v7(), content_id, 4),
    )
    .await;
    assert!(attempt.is_err(), "submission should still be waiting on the lock");
    writer.rollback().await.unwrap();

    assert!(h.service.list_ratings(content_id, None).await.unwrap().is_empty());
    assert_eq!(h.service.recent_activity(content_id).await, 0);

    // The abandoned transaction rolled back; the store still takes writes.
    let outcome = h
        .service
        .submit_rating(UserId::now_v7(), content_id, 4)
        .await
        .unwrap();
    assert!(outcome.created);
    assert_eq!(h.service.list_ratings(content_id, None).await.unwrap().len(), 1);
    assert_eq!(h.service.recent_activity(content_id).await, 1);
}
