//! The storage seam: everything the handlers need from a blob service.

use crate::models::blob::{BlobItem, BlobMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("container `{name}` invalid: {reason}")]
    InvalidContainerName { name: String, reason: String },
    #[error("invalid blob name `{0}`")]
    InvalidBlobName(String),
    #[error("metadata `{0}` cannot be sent to the storage service")]
    InvalidMetadata(String),
    #[error("invalid storage credentials: {0}")]
    InvalidCredentials(String),
    #[error("storage service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("malformed storage response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Flat-namespace blob storage: containers of named blobs carrying metadata.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Every blob in `container`, with properties and metadata. Implementations
    /// follow continuation markers until the listing is exhausted.
    async fn list_blobs(&self, container: &str) -> StoreResult<Vec<BlobItem>>;

    /// Create or overwrite a blob.
    async fn put_blob(
        &self,
        container: &str,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
        metadata: &BlobMetadata,
    ) -> StoreResult<()>;

    /// Cheap reachability check used by `/readyz`.
    async fn probe(&self) -> StoreResult<()>;
}
