//! Axum routers and request handlers.

mod accounts;
mod auth;
mod middleware;
mod public;

pub use auth::{MaybeViewer, RequireViewer, SESSION_COOKIE};
pub use middleware::{RequestContext, log_responses, set_request_context};

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::application::{
    accounts::AccountService, comments::CommentService, error::HttpError, feed::FeedService,
    posts::PostService, relationships::RelationshipService, repos::StoreHealth,
};
use crate::cache::{SnapshotCache, snapshot_layer};
use crate::infra::uploads::UploadStorage;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub relationships: Arc<RelationshipService>,
    pub accounts: Arc<AccountService>,
    pub uploads: Arc<UploadStorage>,
    pub health: Arc<dyn StoreHealth>,
    /// Present when the home-feed snapshot cache is enabled.
    pub snapshots: Option<SnapshotCache>,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the home feed sits behind the snapshot layer; every other feed
    // is recomputed on each request.
    let index_routes = Router::new().route("/", get(public::index));
    let index_routes = match state.snapshots.clone() {
        Some(cache) => index_routes.layer(axum_middleware::from_fn_with_state(
            cache,
            snapshot_layer,
        )),
        None => index_routes,
    };

    Router::new()
        .merge(index_routes)
        .route("/group/{slug}/", get(public::group_feed))
        .route("/profile/{username}/", get(public::profile_feed))
        .route("/posts/{id}/", get(public::post_detail))
        .route("/posts/{id}/comment/", post(public::add_comment))
        .route(
            "/create/",
            get(public::create_form).post(public::create_submit),
        )
        .route(
            "/posts/{id}/edit/",
            get(public::edit_form).post(public::edit_submit),
        )
        .route("/follow/", get(public::follow_feed))
        .route("/profile/{username}/follow/", post(public::follow_author))
        .route(
            "/profile/{username}/unfollow/",
            post(public::unfollow_author),
        )
        .route(
            "/auth/login",
            get(accounts::login_form).post(accounts::login_submit),
        )
        .route(
            "/auth/signup",
            get(accounts::signup_form).post(accounts::signup_submit),
        )
        .route("/auth/logout", post(accounts::logout))
        .route("/uploads/{*path}", get(public::serve_upload))
        .route("/_health/db", get(db_health))
        .fallback(public::fallback)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    match state.health.ping().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(err) => HttpError::from_error(
            "infra::http::db_health",
            StatusCode::SERVICE_UNAVAILABLE,
            "Store unavailable",
            &err,
        )
        .into_response(),
    }
}
