//! HTTP handlers for listing and creating knowledge bases.

use crate::{
    errors::AppError,
    models::knowledge_base::KnowledgeBase,
    services::knowledge_base_service,
    state::AppState,
};
use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use tracing::error;

/// `GET /api/knowledge-bases`
pub async fn list_knowledge_bases(
    State(state): State<AppState>,
) -> Result<Json<Vec<KnowledgeBase>>, AppError> {
    let store = state.store()?;
    Ok(Json(knowledge_base_service::list_knowledge_bases(store).await))
}

/// `POST /api/knowledge-bases` with body `{"name": "..."}`.
///
/// The body is read raw so that malformed JSON and a missing or non-string
/// `name` all get the same 400.
pub async fn create_knowledge_base(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<KnowledgeBase>, AppError> {
    let name = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("name").and_then(Value::as_str).map(str::to_string))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::bad_request("Knowledge base name is required"))?;

    let store = state.store()?;
    knowledge_base_service::create_knowledge_base(store, &name)
        .await
        .map(Json)
        .map_err(|err| {
            error!("knowledge base creation failed for `{}`: {}", name, err);
            AppError::internal("Failed to create knowledge base")
        })
}
