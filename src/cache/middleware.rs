//! Axum layer serving home-feed requests from the snapshot store.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use metrics::counter;
use tracing::warn;

use super::store::{Snapshot, SnapshotStore};

/// State handed to [`snapshot_layer`]. Wraps only the index-feed route;
/// every other feed is computed fresh on each request.
#[derive(Clone)]
pub struct SnapshotCache {
    store: Arc<SnapshotStore>,
}

impl SnapshotCache {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }
}

/// Each index page caches independently: the key is the path plus the raw
/// query string, so `/?page=2` never replays the page-1 snapshot.
fn snapshot_key(uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{query}", uri.path()),
        None => uri.path().to_string(),
    }
}

pub async fn snapshot_layer(
    State(cache): State<SnapshotCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = snapshot_key(request.uri());
    if let Some(replay) = cache.store.replay(&key) {
        counter!("quaderno_snapshot_hit_total").increment(1);
        return replay;
    }
    counter!("quaderno_snapshot_miss_total").increment(1);

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            cache.store.capture(
                key,
                Snapshot::new(parts.status, parts.headers.clone(), bytes.clone()),
            );
            counter!("quaderno_snapshot_capture_total").increment(1);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            warn!(
                target: "quaderno::cache",
                key = %key,
                error = %err,
                "snapshot capture failed; serving uncached"
            );
            Response::from_parts(parts, Body::empty())
        }
    }
}
