//! Shared application state threaded through every handler.

use std::sync::Arc;

use crate::blobstore::DiskBlobStore;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry<DiskBlobStore>>,
    pub max_upload_bytes: u64,
}
