//! Time-bounded snapshot cache for the home feed read path.
//!
//! Invalidation is purely TTL-based. Writes never touch the store, so the
//! home feed may trail reality by up to one window; every other feed is
//! always computed fresh.

mod middleware;
mod store;

pub use middleware::{SnapshotCache, snapshot_layer};
pub use store::{Snapshot, SnapshotStore};
