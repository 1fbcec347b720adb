//! Thin typed wrapper over the HTTP API.

use crate::models::{file_info::FileInfo, knowledge_base::KnowledgeBase};
use anyhow::{Context, Result, anyhow};
use reqwest::{
    Client, Response,
    multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::path::Path;

/// Server reply to a successful upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub success: bool,
    pub message: String,
    pub blob_name: String,
    pub knowledge_base: String,
    pub file_size: u64,
    pub file_type: String,
    #[serde(default)]
    pub virtual_path: Option<String>,
}

/// Document types the processing pipeline accepts.
pub const ACCEPTED_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/markdown",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Extensions matching [`ACCEPTED_TYPES`], for messages.
pub const ACCEPTED_EXTENSIONS: &str = ".pdf, .txt, .md, .docx";

/// The accepted MIME type guessed from `path`'s extension, if any.
pub fn accepted_mime(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).iter().find_map(|guess| {
        let essence = match guess.essence_str() {
            "text/x-markdown" => "text/markdown",
            other => other,
        };
        ACCEPTED_TYPES.iter().copied().find(|accepted| *accepted == essence)
    })
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    /// `base` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_files(&self) -> Result<Vec<FileInfo>> {
        self.get_json("/api/files").await
    }

    pub async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>> {
        self.get_json("/api/knowledge-bases").await
    }

    pub async fn create_knowledge_base(&self, name: &str) -> Result<KnowledgeBase> {
        let response = self
            .http
            .post(self.url("/api/knowledge-bases"))
            .json(&json!({ "name": name }))
            .send()
            .await
            .context("sending knowledge base creation request")?;
        decode(response).await
    }

    /// Upload one file from disk into `knowledge_base`. Files whose type is
    /// not accepted are refused without contacting the server.
    pub async fn upload(&self, path: &Path, knowledge_base: &str) -> Result<UploadReceipt> {
        let mime = accepted_mime(path).ok_or_else(|| {
            anyhow!(
                "{} is not a supported document type ({})",
                path.display(),
                ACCEPTED_EXTENSIONS
            )
        })?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?
            .to_string();

        let part = Part::bytes(bytes).file_name(filename).mime_str(mime)?;
        let form = Form::new()
            .text("knowledgeBase", knowledge_base.to_string())
            .part("file", part);

        let response = self
            .http
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("uploading {}", path.display()))?;
        decode(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("requesting {}", path))?;
        decode(response).await
    }
}

/// Decode a success body, or turn the server's `{error}` body into an error.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    Err(anyhow!("server returned {}: {}", status.as_u16(), message))
}
