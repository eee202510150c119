//! `GET /api/getfilename` — mints an upload reservation.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::debug;

use crate::state::AppState;
use crate::user_key::user_key_from_headers;

pub trait MintRoutes {
    /// Mints a fresh reservation.
    ///
    /// ```http
    /// GET /api/getfilename?ext=png HTTP/1.1
    /// ```
    ///
    /// Always responds `200` with the filename as the plain-text body.
    fn map_mint_endpoint(self) -> Self;
}

impl MintRoutes for Router<AppState> {
    fn map_mint_endpoint(self) -> Self {
        self.route("/api/getfilename", get(get_filename))
    }
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    #[serde(default)]
    ext: String,
}

async fn get_filename(
    State(state): State<AppState>,
    Query(query): Query<QueryParams>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let extension = query.ext.trim_start_matches('.');
    let user_key = user_key_from_headers(&headers);
    let name = state.registry.prepare_upload(extension, user_key).await;
    debug!(name, extension, "minted upload reservation");
    name
}
