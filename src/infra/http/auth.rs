//! Session-cookie identity extraction.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::domain::entities::UserRecord;

use super::HttpState;

pub const SESSION_COOKIE: &str = "quaderno_session";

/// Redirect target for anonymous callers of auth-gated handlers: login with
/// a return path back to where they were headed.
pub fn login_redirect(next: &str) -> String {
    format!("/auth/login?next={next}")
}

/// The viewer, if the request carries a live session. Never rejects; a bad
/// or expired cookie just resolves to anonymous.
pub struct MaybeViewer(pub Option<UserRecord>);

impl FromRequestParts<HttpState> for MaybeViewer {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };

        match state.accounts.authenticate(cookie.value()).await {
            Ok(user) => Ok(Self(user)),
            Err(err) => {
                warn!(
                    target = "quaderno::http::auth",
                    error = %err,
                    "session lookup failed; treating request as anonymous"
                );
                Ok(Self(None))
            }
        }
    }
}

/// An authenticated viewer. Anonymous requests are redirected to the login
/// form with the original path as the return target.
pub struct RequireViewer(pub UserRecord);

impl FromRequestParts<HttpState> for RequireViewer {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();
        let MaybeViewer(viewer) = MaybeViewer::from_request_parts(parts, state)
            .await
            .unwrap_or(MaybeViewer(None));
        match viewer {
            Some(user) => Ok(Self(user)),
            None => Err(Redirect::to(&login_redirect(&path))),
        }
    }
}
