//! Storing uploaded documents.

use crate::{
    models::{blob::BlobMetadata, knowledge_base::DEFAULT_KNOWLEDGE_BASE},
    services::{
        blob_store::{BlobStore, StoreResult},
        catalog::{self, KNOWLEDGE_BASE_CONTAINER, meta},
    },
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

/// Filename used when a multipart file part carries none.
pub const FALLBACK_FILENAME: &str = "blob";

/// A document received from a client, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: Option<String>,
    pub body: Bytes,
    /// Requested knowledge base; blank means default.
    pub knowledge_base: Option<String>,
}

/// What was written.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub blob_name: String,
    pub knowledge_base: String,
    pub file_size: u64,
    pub file_type: String,
    pub virtual_path: Option<String>,
    /// Whether the knowledge-base mirror copy was written.
    pub mirrored: bool,
}

/// Write the document into `container`, then mirror it into the
/// knowledge-base container when it targets a named knowledge base.
///
/// Only the primary write can fail the upload; a failed mirror is logged.
pub async fn upload_document(
    store: &dyn BlobStore,
    container: &str,
    request: UploadRequest,
    now: DateTime<Utc>,
) -> StoreResult<UploadOutcome> {
    let label = request
        .knowledge_base
        .as_deref()
        .map(str::trim)
        .filter(|kb| !kb.is_empty())
        .unwrap_or(DEFAULT_KNOWLEDGE_BASE)
        .to_string();
    let filename = sanitize_filename(&request.filename);
    let blob_name = catalog::upload_blob_name(&label, now.timestamp_millis(), &filename);
    let named_kb = !catalog::is_default_label(&label);
    let file_type = request.content_type.clone().unwrap_or_default();
    let content_type = request.content_type.as_deref().filter(|ct| !ct.is_empty());

    let mut metadata = BlobMetadata::new();
    metadata.insert(meta::ORIGINAL_NAME.into(), request.filename.clone());
    metadata.insert(meta::KNOWLEDGE_BASE.into(), label.clone());
    metadata.insert(
        meta::UPLOAD_TIME.into(),
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    metadata.insert(meta::STATUS.into(), "uploaded".into());
    if named_kb {
        metadata.insert(meta::VIRTUAL_PATH.into(), label.clone());
    }

    store
        .put_blob(
            container,
            &blob_name,
            request.body.clone(),
            content_type,
            &metadata,
        )
        .await?;
    info!(
        "uploaded {} ({} bytes) to {}/{}",
        request.filename,
        request.body.len(),
        container,
        blob_name
    );

    let mut mirrored = false;
    if named_kb {
        metadata.insert(meta::SOURCE_BLOB.into(), blob_name.clone());
        match store
            .put_blob(
                KNOWLEDGE_BASE_CONTAINER,
                &blob_name,
                request.body.clone(),
                content_type,
                &metadata,
            )
            .await
        {
            Ok(()) => {
                mirrored = true;
                info!("mirrored {} into {}", blob_name, KNOWLEDGE_BASE_CONTAINER);
            }
            Err(err) => warn!(
                "failed to mirror {} into {}: {}",
                blob_name, KNOWLEDGE_BASE_CONTAINER, err
            ),
        }
    }

    Ok(UploadOutcome {
        blob_name,
        file_size: request.body.len() as u64,
        file_type,
        virtual_path: named_kb.then(|| label.clone()),
        knowledge_base: label,
        mirrored,
    })
}

/// Last path segment of a client-supplied filename, so a name like
/// `../../x.pdf` cannot escape the knowledge-base prefix.
fn sanitize_filename(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_FILENAME)
        .to_string()
}
