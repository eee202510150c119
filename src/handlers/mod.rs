//! HTTP handlers — the plumbing described only at its interface with the
//! core engine (§6). Grounded on the teacher's own `handlers` module
//! layout (one file per route family, a `*Routes` trait implemented for
//! `Router<AppState>`).
//!
//! `upload` and `download` share the `/:filename` path (PUT vs GET) and so
//! are registered together by [`FileRoutes`]: axum panics at startup if the
//! same path is registered via two separate `.route(...)` calls, so both
//! methods must be attached to one `MethodRouter`.

mod download;
mod health;
mod mint;
mod upload;

use axum::routing::get;
use axum::Router;

pub use health::HealthRoutes;
pub use mint::MintRoutes;

use crate::state::AppState;

pub trait FileRoutes {
    /// Serves both the upload (`PUT`) and download (`GET`) sides of a
    /// minted filename. Any other method on this path yields axum's
    /// default `405 Method Not Allowed` (§6: "any other method... return 405").
    fn map_file_endpoint(self) -> Self;
}

impl FileRoutes for Router<AppState> {
    fn map_file_endpoint(self) -> Self {
        self.route("/:filename", get(download::handle).put(upload::handle))
    }
}
