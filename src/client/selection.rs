//! The knowledge base a user last selected, persisted between runs.

use crate::models::knowledge_base::DEFAULT_KNOWLEDGE_BASE;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use tokio::fs;

const SELECTION_FILE: &str = "selected-knowledge-base";

pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file under the platform's per-user data directory, when one
    /// exists.
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("", "", "kb-uploader").map(|dirs| Self::new(dirs.data_dir().join(SELECTION_FILE)))
    }

    /// The persisted selection; `default` when nothing usable is stored.
    pub async fn load(&self) -> String {
        match fs::read_to_string(&self.path).await {
            Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
            Ok(_) => DEFAULT_KNOWLEDGE_BASE.to_string(),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("could not read {}: {}", self.path.display(), err);
                }
                DEFAULT_KNOWLEDGE_BASE.to_string()
            }
        }
    }

    pub async fn save(&self, knowledge_base: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, knowledge_base)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }
}
