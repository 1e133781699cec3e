//! Caller identity extractors.
//!
//! `Authorization: Token <t>` and `Authorization: Bearer <t>` are both
//! accepted; the token is resolved through the `AuthProvider` held in
//! `AppState`. `Moderator` additionally requires the provider to grant
//! moderation rights.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use rr_core::error::AppError;
use rr_core::models::UserId;

use crate::error::ApiError;
use crate::handlers::AppState;

/// An authenticated caller. Rejects the request with 401 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

/// An authenticated caller with moderation rights: 401 without a valid
/// token, 403 for everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moderator(pub UserId);

/// A caller that may be anonymous. Unresolvable credentials count as none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalCaller(pub Option<UserId>);

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

fn state(req: &HttpRequest) -> Result<&web::Data<AppState>, ApiError> {
    req.app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("application state not configured".into()).into())
}

fn resolve(req: &HttpRequest) -> Result<Option<UserId>, ApiError> {
    let Some(token) = bearer_token(req) else {
        return Ok(None);
    };
    Ok(state(req)?.auth.resolve_caller(token))
}

fn authenticated(req: &HttpRequest) -> Result<UserId, ApiError> {
    resolve(req)?.ok_or_else(|| AppError::Unauthorized("missing or invalid token".into()).into())
}

impl FromRequest for Caller {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticated(req).map(Caller))
    }
}

impl FromRequest for Moderator {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticated(req).and_then(|user_id| {
            if state(req)?.auth.is_moderator(user_id) {
                Ok(Moderator(user_id))
            } else {
                Err(AppError::Forbidden("moderators only".into()).into())
            }
        }))
    }
}

impl FromRequest for OptionalCaller {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(resolve(req).map(OptionalCaller))
    }
}
