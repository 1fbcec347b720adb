//! Defines routes for the document upload API.
//!
//! ## Structure
//! - **Documents**
//!   - `GET  /api/files`           : processed, protected documents
//!   - `POST /api/upload`          : multipart upload of one document
//!
//! - **Knowledge bases**
//!   - `GET  /api/knowledge-bases` : discovered knowledge bases with counts
//!   - `POST /api/knowledge-bases` : create one from `{"name": "..."}`
//!
//! - **Probes**
//!   - `GET  /healthz`, `GET /readyz`

use crate::{
    handlers::{
        file_handlers::list_files,
        health_handlers::{healthz, readyz},
        knowledge_base_handlers::{create_knowledge_base, list_knowledge_bases},
        upload_handlers::upload_file,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build and return the router for the whole API.
///
/// `max_upload_bytes` bounds the upload body; the other routes keep axum's
/// default limit.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/files", get(list_files))
        .route(
            "/api/knowledge-bases",
            get(list_knowledge_bases).post(create_knowledge_base),
        )
        .route(
            "/api/upload",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::blob::BlobItem,
        services::{
            blob_store::{BlobStore, testing::MemoryBlobStore},
            catalog::{KNOWLEDGE_BASE_CONTAINER, PROCESSED_CONTAINER, UPLOADS_CONTAINER},
        },
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "kb-test-boundary";

    fn app(store: Option<Arc<MemoryBlobStore>>) -> Router {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let store = store.map(|s| s as Arc<dyn BlobStore>);
        routes(1024 * 1024).with_state(AppState::new(store, UPLOADS_CONTAINER))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// `parts` are (field name, optional filename, content).
    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match filename {
                Some(filename) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                    name, filename
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_is_always_ok() {
        let (status, json) = send(&app(None), get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn readyz_reports_missing_credentials() {
        let (status, json) = send(&app(None), get("/readyz")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["checks"]["storage"]["ok"], false);

        let store = Arc::new(MemoryBlobStore::new());
        let (status, _) = send(&app(Some(store)), get("/readyz")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn every_storage_route_fails_without_credentials() {
        let app = app(None);
        for request in [
            get("/api/files"),
            get("/api/knowledge-bases"),
            post_json("/api/knowledge-bases", r#"{"name":"Research"}"#),
            multipart(&[("file", Some("a.pdf"), "%PDF")]),
        ] {
            let (status, json) = send(&app, request).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["error"], "Storage configuration missing");
        }
    }

    #[tokio::test]
    async fn files_route_lists_processed_documents() {
        let store = Arc::new(MemoryBlobStore::new());
        let mut blob = BlobItem::new("protected_report.pdf");
        blob.metadata.insert("uploadTime".into(), "invalid".into());
        store.insert(PROCESSED_CONTAINER, blob);
        store.insert(PROCESSED_CONTAINER, BlobItem::new("metadata_report.pdf.json"));

        let before = chrono::Utc::now();
        let (status, json) = send(&app(Some(store)), get("/api/files")).await;
        assert_eq!(status, StatusCode::OK);

        let files = json.as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["status"], "processed");
        assert_eq!(files[0]["knowledgeBase"], "default");
        assert_eq!(files[0]["container"], "processed");
        let upload_time: chrono::DateTime<chrono::Utc> =
            serde_json::from_value(files[0]["uploadTime"].clone()).unwrap();
        assert!(upload_time >= before);
    }

    #[tokio::test]
    async fn knowledge_bases_survive_failing_containers() {
        let store = Arc::new(MemoryBlobStore::new());
        store.fail_container(UPLOADS_CONTAINER);
        store.fail_container(KNOWLEDGE_BASE_CONTAINER);

        let (status, json) = send(&app(Some(store)), get("/api/knowledge-bases")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!([{
                "id": "default",
                "name": "Default Knowledge Base",
                "path": "knowledge-base",
                "fileCount": 0
            }])
        );
    }

    #[tokio::test]
    async fn create_knowledge_base_validates_name() {
        let app = app(Some(Arc::new(MemoryBlobStore::new())));
        for body in [r#"{}"#, r#"{"name": 7}"#, r#"{"name": ""}"#, "not json"] {
            let (status, json) = send(&app, post_json("/api/knowledge-bases", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
            assert_eq!(json["error"], "Knowledge base name is required");
        }
    }

    #[tokio::test]
    async fn created_knowledge_base_appears_in_listing() {
        let store = Arc::new(MemoryBlobStore::new());
        let app = app(Some(store.clone()));

        let (status, json) = send(
            &app,
            post_json("/api/knowledge-bases", r#"{"name":"Project X"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            json!({
                "id": "project-x",
                "name": "Project X",
                "path": "knowledge-base/project-x",
                "fileCount": 0
            })
        );
        assert_eq!(store.names(KNOWLEDGE_BASE_CONTAINER), vec!["project-x/.marker"]);

        let (_, json) = send(&app, get("/api/knowledge-bases")).await;
        let ids: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|kb| kb["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["default", "project-x"]);
    }

    #[tokio::test]
    async fn create_knowledge_base_reports_storage_failure() {
        let store = Arc::new(MemoryBlobStore::new());
        store.fail_container(KNOWLEDGE_BASE_CONTAINER);
        let (status, json) = send(
            &app(Some(store)),
            post_json("/api/knowledge-bases", r#"{"name":"Project X"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to create knowledge base");
    }

    #[tokio::test]
    async fn upload_into_named_knowledge_base() {
        let store = Arc::new(MemoryBlobStore::new());
        let (status, json) = send(
            &app(Some(store.clone())),
            multipart(&[
                ("knowledgeBase", None, "research"),
                ("file", Some("report.pdf"), "%PDF-1.7"),
            ]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "File uploaded successfully");
        assert_eq!(json["knowledgeBase"], "research");
        assert_eq!(json["virtualPath"], "research");
        assert_eq!(json["fileSize"], 8);
        assert_eq!(json["fileType"], "application/pdf");

        let blob_name = json["blobName"].as_str().unwrap();
        assert!(blob_name.starts_with("research/"));
        assert!(blob_name.ends_with("-report.pdf"));
        assert_eq!(store.names(UPLOADS_CONTAINER), vec![blob_name.to_string()]);
        assert_eq!(store.names(KNOWLEDGE_BASE_CONTAINER), vec![blob_name.to_string()]);
    }

    #[tokio::test]
    async fn upload_without_knowledge_base_goes_to_root() {
        let store = Arc::new(MemoryBlobStore::new());
        let (status, json) = send(
            &app(Some(store.clone())),
            multipart(&[("file", Some("notes.pdf"), "hello")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["knowledgeBase"], "default");
        assert!(json.get("virtualPath").is_none());
        assert!(!json["blobName"].as_str().unwrap().contains('/'));
        assert!(store.names(KNOWLEDGE_BASE_CONTAINER).is_empty());
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let store = Arc::new(MemoryBlobStore::new());
        let (status, json) = send(
            &app(Some(store)),
            multipart(&[("knowledgeBase", None, "research")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file provided");
    }

    #[tokio::test]
    async fn upload_reports_primary_write_failure() {
        let store = Arc::new(MemoryBlobStore::new());
        store.fail_container(UPLOADS_CONTAINER);
        let (status, json) = send(
            &app(Some(store)),
            multipart(&[("file", Some("a.pdf"), "x")]),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Upload failed");
    }
}
