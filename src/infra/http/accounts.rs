//! Signup, login, and logout handlers.

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::application::accounts::AccountError;
use crate::application::error::HttpError;
use crate::presentation::views::{
    AuthFormTemplate, AuthFormView, LayoutContext, render_template_response,
};

use super::{HttpState, MaybeViewer, SESSION_COOKIE};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CredentialsForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: String,
}

/// Return targets must stay on-site; anything else falls back to the feed.
fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") {
        next
    } else {
        "/"
    }
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn render_auth_form(view: AuthFormView, status: StatusCode) -> Response {
    let view = LayoutContext::new(None, view);
    render_template_response(AuthFormTemplate { view }, status)
}

pub(super) async fn login_form(
    MaybeViewer(viewer): MaybeViewer,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = query.next.unwrap_or_default();
    if viewer.is_some() {
        return Redirect::to(safe_next(&next)).into_response();
    }
    render_auth_form(AuthFormView::login(next), StatusCode::OK)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    match state.accounts.sign_in(&form.username, &form.password).await {
        Ok(signed_in) => {
            let jar = jar.add(session_cookie(signed_in.token));
            (jar, Redirect::to(safe_next(&form.next))).into_response()
        }
        Err(AccountError::InvalidCredentials) => {
            let mut view = AuthFormView::login(form.next);
            view.username = form.username;
            view.error = Some("Unknown username or wrong password".to_string());
            render_auth_form(view, StatusCode::OK)
        }
        Err(err) => HttpError::from_error(
            "infra::http::accounts::login_submit",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn signup_form(MaybeViewer(viewer): MaybeViewer) -> Response {
    if viewer.is_some() {
        return Redirect::to("/").into_response();
    }
    render_auth_form(AuthFormView::signup(), StatusCode::OK)
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    match state.accounts.sign_up(&form.username, &form.password).await {
        Ok(signed_in) => {
            let jar = jar.add(session_cookie(signed_in.token));
            (jar, Redirect::to("/")).into_response()
        }
        Err(
            err @ (AccountError::UsernameTaken
            | AccountError::InvalidUsername
            | AccountError::WeakPassword),
        ) => {
            let mut view = AuthFormView::signup();
            view.username = form.username;
            view.error = Some(err.to_string());
            render_auth_form(view, StatusCode::OK)
        }
        Err(err) => HttpError::from_error(
            "infra::http::accounts::signup_submit",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Err(err) = state.accounts.sign_out(cookie.value()).await {
            return HttpError::from_error(
                "infra::http::accounts::logout",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &err,
            )
            .into_response();
        }
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    (jar, Redirect::to("/")).into_response()
}
