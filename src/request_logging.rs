//! Structured per-request timing log.
//!
//! Grounded on `src/services/metrics.rs` (`HttpCallMetrics`, a `tower::Service`
//! wrapper that timed every request for the Prometheus registry dropped in
//! this rewrite — see `DESIGN.md`). The timing itself is the ambient concern
//! worth keeping; the Prometheus export surface is not (no metrics Non-goal
//! is named in the specification, but nothing in its HTTP surface exposes a
//! `/metrics` endpoint either, so there is no remaining consumer for
//! exported histograms). Rebuilt as a plain `axum::middleware::from_fn`
//! layer that logs via `tracing` instead.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tokio::time::Instant;
use tracing::info;

pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    response
}
