//! # rr-api
//!
//! The HTTP routing layer for Rusty-Ratings.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;

use actix_web::web;

/// Mounts every route at the root of the given config.
///
/// The binary may wrap this in a scope to serve under a prefix (e.g., /api/v1/).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/metrics", web::get().to(handlers::metrics))
        .service(
            web::scope("/contents")
                .route("", web::get().to(handlers::list_contents))
                .route("/{id}", web::get().to(handlers::get_content))
                .service(
                    web::resource("/{id}/ratings")
                        .route(web::get().to(handlers::list_ratings))
                        .route(web::post().to(handlers::submit_rating)),
                )
                .route("/{id}/activity", web::get().to(handlers::recent_activity)),
        );
}
