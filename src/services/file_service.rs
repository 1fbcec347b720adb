//! Listing of processed documents.

use crate::{
    models::{
        blob::BlobItem,
        file_info::{FileInfo, FileStatus},
    },
    services::{
        blob_store::BlobStore,
        catalog::{self, PROCESSED_CONTAINER, meta},
    },
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Every protected document in the processed container, newest first.
///
/// A failing listing degrades to an empty result.
pub async fn list_processed_files(store: &dyn BlobStore) -> Vec<FileInfo> {
    let blobs = match store.list_blobs(PROCESSED_CONTAINER).await {
        Ok(blobs) => blobs,
        Err(err) => {
            warn!(
                "failed to list blobs in container {}: {}",
                PROCESSED_CONTAINER, err
            );
            return Vec::new();
        }
    };

    let now = Utc::now();
    let mut files: Vec<FileInfo> = blobs
        .iter()
        .filter(|blob| is_listable(blob))
        .map(|blob| file_record(blob, PROCESSED_CONTAINER, now))
        .collect();

    files.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
    info!("listed {} processed files", files.len());
    files
}

fn is_listable(blob: &BlobItem) -> bool {
    if blob.is_directory_placeholder() {
        return false;
    }
    if !catalog::is_protected_document(&blob.name) {
        debug!("skipping {}: not a protected document", blob.name);
        return false;
    }
    true
}

/// Build the record for a blob found in `container`.
///
/// Status is always `Processed`: presence in the processed container is the
/// only signal available.
pub fn file_record(blob: &BlobItem, container: &str, now: DateTime<Utc>) -> FileInfo {
    let knowledge_base = catalog::resolve_knowledge_base(blob);
    debug!("file {} assigned to knowledge base {}", blob.name, knowledge_base);

    let upload_time = match blob.meta(meta::UPLOAD_TIME).filter(|v| !v.is_empty()) {
        Some(raw) => catalog::timestamp_or(Some(raw), now),
        None => blob.created_on.unwrap_or(now),
    };
    let process_time = blob
        .meta(meta::PROCESS_TIME)
        .filter(|v| !v.is_empty())
        .map(|raw| catalog::timestamp_or(Some(raw), now));

    let name = blob
        .meta(meta::ORIGINAL_NAME)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| blob.simple_name());
    let name = if name.is_empty() { blob.name.as_str() } else { name };

    FileInfo {
        id: format!("{}-{}", container, blob.name),
        name: name.to_string(),
        size: blob.content_length,
        content_type: blob
            .content_type
            .clone()
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        status: FileStatus::Processed,
        upload_time,
        process_time,
        message: Some(format!(
            "Document processed and added to {} knowledge base",
            knowledge_base
        )),
        knowledge_base,
        blob_name: blob.name.clone(),
        container: container.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::blob_store::testing::MemoryBlobStore;
    use chrono::{Duration, TimeZone};

    fn processed(name: &str, meta: &[(&str, &str)]) -> BlobItem {
        let mut blob = BlobItem::new(name);
        blob.content_length = 10;
        blob.content_type = Some("text/markdown".into());
        for (k, v) in meta {
            blob.metadata.insert(k.to_string(), v.to_string());
        }
        blob
    }

    #[tokio::test]
    async fn lists_only_protected_documents_newest_first() {
        let store = MemoryBlobStore::new();
        store.insert(
            PROCESSED_CONTAINER,
            processed("protected_old.md", &[("uploadTime", "2024-01-01T00:00:00Z")]),
        );
        store.insert(
            PROCESSED_CONTAINER,
            processed(
                "research/protected_new.md",
                &[("uploadTime", "2024-06-01T00:00:00Z")],
            ),
        );
        store.insert(PROCESSED_CONTAINER, processed("metadata_old.json", &[]));
        store.insert(PROCESSED_CONTAINER, processed("protected_x.json", &[]));
        store.insert(PROCESSED_CONTAINER, processed("notes.md", &[]));
        let mut dir = processed("research/", &[]);
        dir.content_length = 0;
        store.insert(PROCESSED_CONTAINER, dir);

        let files = list_processed_files(&store).await;
        let names: Vec<_> = files.iter().map(|f| f.blob_name.as_str()).collect();
        assert_eq!(names, vec!["research/protected_new.md", "protected_old.md"]);
        assert_eq!(files[0].knowledge_base, "research");
        assert_eq!(files[0].id, "processed-research/protected_new.md");
        assert_eq!(files[1].knowledge_base, "default");
    }

    #[tokio::test]
    async fn listing_failure_degrades_to_empty() {
        let store = MemoryBlobStore::new();
        store.fail_container(PROCESSED_CONTAINER);
        assert!(list_processed_files(&store).await.is_empty());
    }

    #[tokio::test]
    async fn missing_container_degrades_to_empty() {
        let store = MemoryBlobStore::new();
        assert!(list_processed_files(&store).await.is_empty());
    }

    #[test]
    fn invalid_upload_time_becomes_now() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();
        let blob = processed("protected_report.pdf", &[("uploadTime", "invalid")]);
        let record = file_record(&blob, PROCESSED_CONTAINER, now);
        assert_eq!(record.upload_time, now);
        assert_eq!(record.status, FileStatus::Processed);
        assert_eq!(record.knowledge_base, "default");
        assert_eq!(record.process_time, None);
        assert_eq!(
            record.message.as_deref(),
            Some("Document processed and added to default knowledge base")
        );
    }

    #[test]
    fn falls_back_to_creation_time_and_simple_name() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();
        let created = now - Duration::days(3);
        let mut blob = processed("legal/protected_brief.md", &[("processTime", "2025-01-30")]);
        blob.created_on = Some(created);
        blob.content_type = None;

        let record = file_record(&blob, PROCESSED_CONTAINER, now);
        assert_eq!(record.upload_time, created);
        assert_eq!(record.name, "protected_brief.md");
        assert_eq!(record.content_type, "application/octet-stream");
        assert_eq!(
            record.process_time,
            Some(Utc.with_ymd_and_hms(2025, 1, 30, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn original_name_metadata_is_display_name() {
        let blob = processed("protected_x.md", &[("originalName", "Quarterly.pdf")]);
        let record = file_record(&blob, PROCESSED_CONTAINER, Utc::now());
        assert_eq!(record.name, "Quarterly.pdf");
    }
}
