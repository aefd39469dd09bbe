use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

use crate::{
    auth::{
        dto::{MessageResponse, PublicUser, SessionResponse, UserData},
        store::User,
    },
    config::{AppConfig, Environment},
};

pub const SESSION_COOKIE: &str = "session-token";

/// Wraps a freshly authenticated user and token into the outbound
/// response: same-site http-only cookie plus the success envelope with
/// the sanitized user.
pub fn session_envelope(
    user: &User,
    token: String,
    status: StatusCode,
    config: &AppConfig,
) -> Response {
    let mut cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .expires(OffsetDateTime::now_utc() + Duration::days(config.jwt.cookie_expires_days));
    if config.environment == Environment::Production {
        cookie = cookie.secure(true);
    }
    let jar = CookieJar::new().add(cookie);

    let body = SessionResponse {
        status: "success",
        token,
        data: UserData {
            user: PublicUser::from(user),
        },
    };
    (status, jar, Json(body)).into_response()
}

/// Removal cookie plus an acknowledgement body.
pub fn logout_envelope() -> Response {
    let jar = CookieJar::new().remove(Cookie::build(SESSION_COOKIE).path("/"));
    let body = MessageResponse {
        status: "success",
        message: "logged out".into(),
    };
    (StatusCode::OK, jar, Json(body)).into_response()
}
