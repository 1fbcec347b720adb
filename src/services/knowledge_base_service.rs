//! Discovery, counting and creation of knowledge bases.

use crate::{
    models::{
        blob::{BlobItem, BlobMetadata},
        knowledge_base::KnowledgeBase,
    },
    services::{
        blob_store::{BlobStore, StoreResult},
        catalog::{self, KNOWLEDGE_BASE_CONTAINER, PROCESSED_CONTAINER, UPLOADS_CONTAINER},
    },
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

const MARKER_NAME: &str = ".marker";
const MARKER_TYPE: &str = "knowledge-base-marker";

/// All known knowledge bases with their processed file counts.
///
/// The default entry is always present. Containers that cannot be listed
/// contribute nothing.
pub async fn list_knowledge_bases(store: &dyn BlobStore) -> Vec<KnowledgeBase> {
    let (uploads, kb_container, processed) = futures::join!(
        listing_or_empty(store, UPLOADS_CONTAINER),
        listing_or_empty(store, KNOWLEDGE_BASE_CONTAINER),
        listing_or_empty(store, PROCESSED_CONTAINER),
    );

    let mut knowledge_bases = vec![KnowledgeBase::default_entry()];
    discover(&mut knowledge_bases, &uploads);
    discover(&mut knowledge_bases, &kb_container);
    count_files(&mut knowledge_bases, &processed);

    info!("found {} knowledge bases", knowledge_bases.len());
    knowledge_bases
}

async fn listing_or_empty(store: &dyn BlobStore, container: &str) -> Vec<BlobItem> {
    store.list_blobs(container).await.unwrap_or_else(|err| {
        warn!("failed to list blobs in container {}: {}", container, err);
        Vec::new()
    })
}

/// Add an entry for every first path segment not already present, keeping
/// first-seen order.
pub fn discover(knowledge_bases: &mut Vec<KnowledgeBase>, blobs: &[BlobItem]) {
    for blob in blobs {
        let Some(id) = catalog::virtual_path(&blob.name) else {
            continue;
        };
        if knowledge_bases.iter().any(|kb| kb.id == id) {
            continue;
        }
        knowledge_bases.push(KnowledgeBase::discovered(id));
    }
}

/// Set each entry's `file_count` from a processed-container listing.
pub fn count_files(knowledge_bases: &mut [KnowledgeBase], processed: &[BlobItem]) {
    let protected: Vec<&str> = processed
        .iter()
        .map(|blob| blob.name.as_str())
        .filter(|name| catalog::is_protected_document(name))
        .collect();

    for kb in knowledge_bases.iter_mut() {
        kb.file_count = protected
            .iter()
            .filter(|name| catalog::counts_towards(&kb.id, name))
            .count() as u64;
    }
}

/// Register a knowledge base by writing a zero-byte marker blob at
/// `{id}/.marker` in the knowledge-base container.
pub async fn create_knowledge_base(store: &dyn BlobStore, name: &str) -> StoreResult<KnowledgeBase> {
    let id = catalog::knowledge_base_id(name);
    let marker = format!("{}/{}", id, MARKER_NAME);

    let mut metadata = BlobMetadata::new();
    metadata.insert("name".into(), name.to_string());
    metadata.insert(
        "created".into(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    metadata.insert("type".into(), MARKER_TYPE.into());

    store
        .put_blob(KNOWLEDGE_BASE_CONTAINER, &marker, Bytes::new(), None, &metadata)
        .await?;

    info!("created knowledge base {} ({})", id, name);
    Ok(KnowledgeBase::created(&id, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::blob_store::testing::MemoryBlobStore;

    fn ids(kbs: &[KnowledgeBase]) -> Vec<&str> {
        kbs.iter().map(|kb| kb.id.as_str()).collect()
    }

    fn count_of(kbs: &[KnowledgeBase], id: &str) -> u64 {
        kbs.iter().find(|kb| kb.id == id).map(|kb| kb.file_count).unwrap()
    }

    #[tokio::test]
    async fn discovers_prefixes_and_counts_processed_files() {
        let store = MemoryBlobStore::new();
        store.insert(UPLOADS_CONTAINER, BlobItem::new("1700-root.pdf"));
        store.insert(UPLOADS_CONTAINER, BlobItem::new("research/1700-a.pdf"));
        store.insert(UPLOADS_CONTAINER, BlobItem::new("research/1701-b.pdf"));
        store.insert(KNOWLEDGE_BASE_CONTAINER, BlobItem::new("legal/.marker"));
        store.insert(KNOWLEDGE_BASE_CONTAINER, BlobItem::new("research/1700-a.pdf"));

        for name in [
            "protected_root.md",
            "protected_other.md",
            "research/protected_a.md",
            "research/metadata_a.json",
            "research/a.md",
            "legal/protected_brief.md",
            "legal/protected_brief.json",
            "orphan/protected_z.md",
        ] {
            store.insert(PROCESSED_CONTAINER, BlobItem::new(name));
        }

        let kbs = list_knowledge_bases(&store).await;
        assert_eq!(ids(&kbs), vec!["default", "research", "legal"]);
        assert_eq!(count_of(&kbs, "default"), 2);
        assert_eq!(count_of(&kbs, "research"), 1);
        assert_eq!(count_of(&kbs, "legal"), 1);
        assert_eq!(kbs[1].name, "Research Documents");
    }

    #[tokio::test]
    async fn failing_containers_still_yield_default_entry() {
        let store = MemoryBlobStore::new();
        store.fail_container(UPLOADS_CONTAINER);
        store.fail_container(KNOWLEDGE_BASE_CONTAINER);

        let kbs = list_knowledge_bases(&store).await;
        assert_eq!(kbs, vec![KnowledgeBase::default_entry()]);
    }

    #[tokio::test]
    async fn created_knowledge_base_is_listed_afterwards() {
        let store = MemoryBlobStore::new();
        let kb = create_knowledge_base(&store, "Project X").await.unwrap();
        assert_eq!(kb.id, "project-x");
        assert_eq!(kb.name, "Project X");
        assert_eq!(kb.path, "knowledge-base/project-x");

        let marker = store
            .get(KNOWLEDGE_BASE_CONTAINER, "project-x/.marker")
            .expect("marker written");
        assert!(marker.body.is_empty());
        assert_eq!(marker.item.meta("type"), Some("knowledge-base-marker"));
        assert_eq!(marker.item.meta("name"), Some("Project X"));

        let kbs = list_knowledge_bases(&store).await;
        assert!(kbs.iter().any(|kb| kb.id == "project-x"));
    }

    #[tokio::test]
    async fn create_surfaces_write_failures() {
        let store = MemoryBlobStore::new();
        store.fail_container(KNOWLEDGE_BASE_CONTAINER);
        assert!(create_knowledge_base(&store, "Broken").await.is_err());
    }
}
