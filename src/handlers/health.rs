//! A small liveness endpoint, kept from the teacher's health-check surface
//! (`bins/server/src/handlers/health.rs`) and trimmed to what this service
//! actually needs: the core engine has no external dependencies to probe
//! (no database, no downstream backend), so there is nothing for a
//! readiness check to distinguish from a liveness check.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use axum::http::StatusCode;

use crate::state::AppState;

pub trait HealthRoutes {
    /// Provides a liveness probe.
    ///
    /// ```http
    /// GET /healthz HTTP/1.1
    /// ```
    fn map_health_endpoints(self) -> Self;
}

impl HealthRoutes for Router<AppState> {
    fn map_health_endpoints(self) -> Self {
        self.route("/healthz", get(healthz))
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
