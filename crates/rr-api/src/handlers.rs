//! # rr-api Handlers
//!
//! Thin adapters between HTTP requests and `RatingService`.

use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use rr_core::models::ContentId;
use rr_core::service::RatingService;
use rr_core::traits::AuthProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{Caller, Moderator, OptionalCaller};
use crate::error::ApiResult;
use crate::metrics::Metrics;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub service: RatingService,
    pub auth: Box<dyn AuthProvider>,
    pub metrics: Metrics,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRatingRequest {
    /// Raw so out-of-range values reach validation instead of failing decode.
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct RatingsQuery {
    pub verified: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub content_id: ContentId,
    pub recent_ratings: u64,
}

/// Every content item with its cached aggregates and the caller's own score.
pub async fn list_contents(
    data: web::Data<AppState>,
    caller: OptionalCaller,
) -> ApiResult<HttpResponse> {
    let listings = data.service.list_content(caller.0).await?;
    data.metrics.record_listing();
    Ok(HttpResponse::Ok().json(listings))
}

pub async fn get_content(
    data: web::Data<AppState>,
    caller: OptionalCaller,
    path: web::Path<ContentId>,
) -> ApiResult<HttpResponse> {
    let listing = data.service.get_content(caller.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(listing))
}

/// Creates or updates the caller's rating. Answers 201 with no body either way;
/// the verification outcome is not disclosed to the rater.
pub async fn submit_rating(
    data: web::Data<AppState>,
    caller: Caller,
    path: web::Path<ContentId>,
    body: web::Json<SubmitRatingRequest>,
) -> ApiResult<HttpResponse> {
    let content_id = path.into_inner();
    match data
        .service
        .submit_rating(caller.0, content_id, body.score)
        .await
    {
        Ok(outcome) => {
            data.metrics.record_submission(outcome.verification);
            Ok(HttpResponse::Created().finish())
        }
        Err(err) => {
            warn!(%content_id, user_id = %caller.0, error = %err, "rating rejected");
            data.metrics.record_rejection();
            Err(err.into())
        }
    }
}

/// Individual ratings with their verification flags. Moderators only.
pub async fn list_ratings(
    data: web::Data<AppState>,
    moderator: Moderator,
    path: web::Path<ContentId>,
    query: web::Query<RatingsQuery>,
) -> ApiResult<HttpResponse> {
    let content_id = path.into_inner();
    let ratings = data.service.list_ratings(content_id, query.verified).await?;
    debug!(%content_id, moderator = %moderator.0, returned = ratings.len(), "ratings listed");
    Ok(HttpResponse::Ok().json(ratings))
}

/// Approximate ratings in the current window; zero if the counter is down.
pub async fn recent_activity(
    data: web::Data<AppState>,
    path: web::Path<ContentId>,
) -> HttpResponse {
    let content_id = path.into_inner();
    let recent_ratings = data.service.recent_activity(content_id).await;
    HttpResponse::Ok().json(ActivityResponse {
        content_id,
        recent_ratings,
    })
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

pub async fn metrics(data: web::Data<AppState>) -> HttpResponse {
    match data.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type(
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )
            .body(body),
        Err(err) => {
            warn!(error = %err, "failed to encode metrics");
            HttpResponse::InternalServerError()
                .content_type(ContentType::plaintext())
                .body("metrics unavailable")
        }
    }
}
