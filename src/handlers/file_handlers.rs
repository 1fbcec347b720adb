//! `GET /api/files`

use crate::{
    errors::AppError, models::file_info::FileInfo, services::file_service, state::AppState,
};
use axum::{Json, extract::State};

/// List processed documents, newest first.
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileInfo>>, AppError> {
    let store = state.store()?;
    Ok(Json(file_service::list_processed_files(store).await))
}
