//! Snapshot storage: rendered responses kept for a bounded time window.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use bytes::Bytes;
use dashmap::DashMap;

/// A fully rendered response frozen at capture time. Replays are
/// byte-identical to the captured body no matter what the store does
/// underneath in the meantime.
#[derive(Clone)]
pub struct Snapshot {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    captured_at: Instant,
}

impl Snapshot {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            captured_at: Instant::now(),
        }
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.captured_at.elapsed() >= ttl
    }

    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Keyed snapshot slots with purely time-based invalidation. Readers share
/// the stored bytes; expiry is observed on read and the slot is replaced
/// atomically by the next successful capture.
pub struct SnapshotStore {
    entries: DashMap<String, Snapshot>,
    ttl: Duration,
}

impl SnapshotStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Replay the live snapshot for `key`, if any. An expired snapshot is
    /// treated as absent; it stays in its slot until the fresh capture
    /// overwrites it, so readers never observe a half-written entry.
    pub fn replay(&self, key: &str) -> Option<Response> {
        let entry = self.entries.get(key)?;
        if entry.value().expired(self.ttl) {
            return None;
        }
        Some(entry.value().clone().into_response())
    }

    pub fn capture(&self, key: String, snapshot: Snapshot) {
        self.entries.insert(key, snapshot);
    }

    #[cfg(test)]
    fn peek(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key).map(|entry| entry.body.clone())
    }
}
