//! A blob as reported by a storage listing, plus the metadata written with it.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// User-defined key/value pairs stored alongside a blob.
///
/// Kept ordered so that signed requests and stored rows are deterministic.
pub type BlobMetadata = BTreeMap<String, String>;

/// One entry from a flat container listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlobItem {
    /// Full blob path within its container, e.g. `research/1700000000000-report.pdf`.
    pub name: String,

    /// Payload size in bytes.
    pub content_length: u64,

    /// Content type recorded at upload time, if any.
    pub content_type: Option<String>,

    /// Creation time reported by the storage service.
    pub created_on: Option<DateTime<Utc>>,

    /// User metadata.
    pub metadata: BlobMetadata,
}

impl BlobItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up a metadata value, ignoring ASCII case of the key.
    ///
    /// Metadata travels as HTTP headers on write and XML element names on
    /// listing, so the key case seen here is not guaranteed to match what
    /// the writer used.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Last path segment of the blob name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// True for zero-length entries ending in `/`, which some tools create to
    /// fake directories.
    pub fn is_directory_placeholder(&self) -> bool {
        self.content_length == 0 && self.name.ends_with('/')
    }
}
