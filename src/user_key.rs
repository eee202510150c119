//! The `userKey` field threaded through the registry's operations.
//!
//! Per the specification's open question (§9): the core accepts this value
//! at every boundary but never interprets it. Extracting it from a header
//! here is the only place that would need to change if an auth policy were
//! ever defined; the registry only ever stores and forwards it.

use axum::http::HeaderMap;

const USER_KEY_HEADER: &str = "x-user-key";

pub fn user_key_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(USER_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
