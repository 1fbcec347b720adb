//! Knowledge base records.

use serde::{Deserialize, Serialize};

/// Identifier of the knowledge base that owns files stored at container root.
pub const DEFAULT_KNOWLEDGE_BASE: &str = "default";

/// A logical grouping of documents, represented in storage as a virtual path
/// prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    /// Lowercase, hyphenated identifier; also the virtual path prefix.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Logical storage path, `knowledge-base/{id}`.
    pub path: String,

    /// Number of processed protected files that belong here.
    pub file_count: u64,
}

impl KnowledgeBase {
    /// The permanent entry every listing starts with.
    pub fn default_entry() -> Self {
        Self {
            id: DEFAULT_KNOWLEDGE_BASE.to_string(),
            name: "Default Knowledge Base".to_string(),
            path: "knowledge-base".to_string(),
            file_count: 0,
        }
    }

    /// An entry discovered from a virtual path prefix in storage.
    pub fn discovered(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("{} Documents", capitalize(id)),
            path: format!("knowledge-base/{}", id),
            file_count: 0,
        }
    }

    /// An entry created explicitly with a display name.
    pub fn created(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            path: format!("knowledge-base/{}", id),
            file_count: 0,
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
