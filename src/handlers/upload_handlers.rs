//! `POST /api/upload`: one document per request, sent as multipart form data.

use crate::{
    errors::AppError,
    services::upload_service::{self, FALLBACK_FILENAME, UploadRequest},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error};

/// Body of a successful upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub blob_name: String,
    pub knowledge_base: String,
    pub file_size: u64,
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_path: Option<String>,
}

/// Accepts a `file` part and an optional `knowledgeBase` text part.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("upload without multipart body: {}", rejection);
        AppError::bad_request("Invalid multipart body")
    })?;

    let mut file: Option<(String, Option<String>, axum::body::Bytes)> = None;
    let mut knowledge_base = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") if file.is_none() => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some((filename, content_type, bytes));
            }
            Some("knowledgeBase") => knowledge_base = Some(field.text().await?),
            other => debug!("ignoring multipart field {:?}", other),
        }
    }

    let Some((filename, content_type, body)) = file else {
        return Err(AppError::bad_request("No file provided"));
    };

    let store = state.store()?;
    let request = UploadRequest {
        filename,
        content_type,
        body,
        knowledge_base,
    };
    let outcome = upload_service::upload_document(store, &state.upload_container, request, Utc::now())
        .await
        .map_err(|err| {
            error!("upload to {} failed: {}", state.upload_container, err);
            AppError::internal("Upload failed")
        })?;
    debug!(
        "stored {} ({} bytes, mirrored: {})",
        outcome.blob_name, outcome.file_size, outcome.mirrored
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully".into(),
        blob_name: outcome.blob_name,
        knowledge_base: outcome.knowledge_base,
        file_size: outcome.file_size,
        file_type: outcome.file_type,
        virtual_path: outcome.virtual_path,
    }))
}
