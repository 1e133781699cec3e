//! Request logging and CORS.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;

/// remote-ip "request-line" status size time, with the caller's user agent.
pub fn request_logger() -> Logger {
    Logger::new(r#"%a "%r" %s %b %Dms "%{User-Agent}i""#)
}

/// Read endpoints are public; rating submission needs the Authorization header.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}
