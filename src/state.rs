//! Shared, immutable per-process state handed to every handler.

use crate::{errors::AppError, services::blob_store::BlobStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// `None` when storage credentials were not configured.
    store: Option<Arc<dyn BlobStore>>,

    /// Container receiving uploads.
    pub upload_container: String,
}

impl AppState {
    pub fn new(store: Option<Arc<dyn BlobStore>>, upload_container: impl Into<String>) -> Self {
        Self {
            store,
            upload_container: upload_container.into(),
        }
    }

    /// The configured store, or the 500 every storage-backed handler returns
    /// without credentials.
    pub fn store(&self) -> Result<&dyn BlobStore, AppError> {
        match &self.store {
            Some(store) => Ok(store.as_ref()),
            None => {
                tracing::error!("storage account name or access key not configured");
                Err(AppError::storage_config_missing())
            }
        }
    }
}
