//! File records returned by `GET /api/files`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a file is in the upload → processing pipeline.
///
/// Nothing tracks this authoritatively. The server reports `Processed` for
/// everything it finds in the processed container, and clients set the
/// other values optimistically until the next poll.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Processing => "processing",
            FileStatus::Processed => "processed",
            FileStatus::Error => "error",
        }
    }
}

/// A single listed document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// `{container}-{blob_name}`.
    pub id: String,

    /// Original filename when known, otherwise the last path segment.
    pub name: String,

    /// Size in bytes.
    pub size: u64,

    /// MIME type.
    #[serde(rename = "type")]
    pub content_type: String,

    pub status: FileStatus,

    pub upload_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_time: Option<DateTime<Utc>>,

    pub knowledge_base: String,

    pub blob_name: String,

    pub container: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
