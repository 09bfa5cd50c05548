//! Prefixed ID generation.
//!
//! Connection IDs use a `prefix_` followed by a UUIDv7 (time-ordered), so log
//! lines for one client can be grepped and sorted by connect time.

use uuid::Uuid;

/// Generate a prefixed ID using UUIDv7.
fn prefixed_id(prefix: &str) -> String {
    let id = Uuid::now_v7();
    format!("{}_{}", prefix, id.as_simple())
}

/// Generate a connection ID: `conn_<uuid7>`
pub fn connection_id() -> String {
    prefixed_id("conn")
}
