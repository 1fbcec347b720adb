//! Naming and filtering rules shared by the upload, listing and
//! knowledge-base operations.
//!
//! Everything here is a pure function of blob names and metadata so the
//! handlers and the client agree on grouping and counts.

use crate::models::{blob::BlobItem, knowledge_base::DEFAULT_KNOWLEDGE_BASE};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Container holding the processing pipeline's output.
pub const PROCESSED_CONTAINER: &str = "processed";
/// Container scanned for knowledge-base prefixes alongside the uploads.
pub const KNOWLEDGE_BASE_CONTAINER: &str = "knowledge-base";
/// Upload container name the knowledge-base scan always reads.
pub const UPLOADS_CONTAINER: &str = "uploads";

/// Simple-name prefix the processing pipeline gives its finished output.
pub const PROTECTED_PREFIX: &str = "protected_";
/// Substring marking the pipeline's metadata sidecars.
pub const METADATA_MARKER: &str = "metadata_";
const JSON_SUFFIX: &str = ".json";

/// Metadata keys written by uploads and read back by listings.
pub mod meta {
    pub const ORIGINAL_NAME: &str = "originalName";
    pub const KNOWLEDGE_BASE: &str = "knowledgeBase";
    pub const UPLOAD_TIME: &str = "uploadTime";
    pub const PROCESS_TIME: &str = "processTime";
    pub const STATUS: &str = "status";
    pub const VIRTUAL_PATH: &str = "virtualPath";
    pub const SOURCE_BLOB: &str = "sourceBlob";
}

/// A processed document worth listing: the simple name carries the
/// protected prefix, and the path is neither a metadata sidecar nor JSON.
pub fn is_protected_document(blob_name: &str) -> bool {
    let simple = blob_name.rsplit('/').next().unwrap_or(blob_name);
    simple.starts_with(PROTECTED_PREFIX)
        && !blob_name.contains(METADATA_MARKER)
        && !blob_name.ends_with(JSON_SUFFIX)
}

/// First path segment, only when the name has a separator at all.
pub fn virtual_path(blob_name: &str) -> Option<&str> {
    blob_name.split_once('/').map(|(first, _)| first)
}

/// Knowledge base a blob belongs to: the `knowledgeBase` metadata value,
/// else the first path segment, else `default`.
pub fn resolve_knowledge_base(blob: &BlobItem) -> String {
    if let Some(kb) = blob.meta(meta::KNOWLEDGE_BASE).filter(|v| !v.is_empty()) {
        return kb.to_string();
    }
    virtual_path(&blob.name)
        .unwrap_or(DEFAULT_KNOWLEDGE_BASE)
        .to_string()
}

/// Whether `blob_name` is counted towards knowledge base `kb_id`.
///
/// The default knowledge base owns everything at container root; any other
/// owns its `{id}/` prefix.
pub fn counts_towards(kb_id: &str, blob_name: &str) -> bool {
    if kb_id == DEFAULT_KNOWLEDGE_BASE {
        !blob_name.contains('/')
    } else {
        blob_name
            .strip_prefix(kb_id)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Identifier for a new knowledge base: lowercased, each whitespace run
/// collapsed into a single `-`.
pub fn knowledge_base_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                id.push('-');
            }
            in_space = true;
        } else {
            id.extend(c.to_lowercase());
            in_space = false;
        }
    }
    id
}

/// True when `label` selects the default knowledge base.
pub fn is_default_label(label: &str) -> bool {
    label == DEFAULT_KNOWLEDGE_BASE
}

/// Blob path for a new upload: `{ts}-{file}` at root for the default
/// knowledge base, `{label}/{ts}-{file}` otherwise.
pub fn upload_blob_name(label: &str, timestamp_ms: i64, filename: &str) -> String {
    if is_default_label(label) {
        format!("{}-{}", timestamp_ms, filename)
    } else {
        format!("{}/{}-{}", label, timestamp_ms, filename)
    }
}

/// Parse the timestamp formats found in blob metadata and service
/// properties. RFC 3339, RFC 2822/1123, and zone-less ISO date-times (read
/// as UTC) are accepted.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Total version of [`parse_timestamp`]: anything missing or unparsable
/// becomes `now`.
pub fn timestamp_or(value: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    match value.and_then(parse_timestamp) {
        Some(ts) => ts,
        None => {
            if let Some(raw) = value {
                tracing::debug!("invalid date value `{}`, using current time", raw);
            }
            now
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn blob_with_kb(name: &str, kb: Option<&str>) -> BlobItem {
        let mut blob = BlobItem::new(name);
        if let Some(kb) = kb {
            blob.metadata
                .insert(meta::KNOWLEDGE_BASE.into(), kb.into());
        }
        blob
    }

    #[test]
    fn protected_filter_checks_simple_name_and_exclusions() {
        assert!(is_protected_document("protected_report.pdf.md"));
        assert!(is_protected_document("research/protected_report.pdf.md"));
        assert!(!is_protected_document("report.pdf"));
        assert!(!is_protected_document("protected_dir/report.md"));
        assert!(!is_protected_document("protected_report.json"));
        assert!(!is_protected_document("protected_metadata_report.md"));
        assert!(!is_protected_document("metadata_x/protected_report.md"));
    }

    #[test]
    fn metadata_knowledge_base_wins_over_path() {
        let blob = blob_with_kb("research/protected_a.md", Some("legal"));
        assert_eq!(resolve_knowledge_base(&blob), "legal");
    }

    #[test]
    fn path_segment_used_without_metadata() {
        let blob = blob_with_kb("research/sub/protected_a.md", None);
        assert_eq!(resolve_knowledge_base(&blob), "research");
    }

    #[test]
    fn root_blob_without_metadata_is_default() {
        let blob = blob_with_kb("protected_a.md", None);
        assert_eq!(resolve_knowledge_base(&blob), "default");
    }

    #[test]
    fn empty_metadata_value_falls_through_to_path() {
        let blob = blob_with_kb("research/protected_a.md", Some(""));
        assert_eq!(resolve_knowledge_base(&blob), "research");
    }

    #[test]
    fn count_membership_uses_prefix_with_separator() {
        assert!(counts_towards("default", "protected_a.md"));
        assert!(!counts_towards("default", "research/protected_a.md"));
        assert!(counts_towards("research", "research/protected_a.md"));
        assert!(!counts_towards("research", "research-old/protected_a.md"));
        assert!(!counts_towards("research", "protected_a.md"));
    }

    #[test]
    fn knowledge_base_id_lowercases_and_hyphenates() {
        assert_eq!(knowledge_base_id("Project X"), "project-x");
        assert_eq!(knowledge_base_id("Q3  \t Reports"), "q3-reports");
        assert_eq!(knowledge_base_id(" Lead"), "-lead");
    }

    #[test]
    fn upload_names_nest_under_label() {
        assert_eq!(upload_blob_name("default", 42, "a.pdf"), "42-a.pdf");
        assert_eq!(upload_blob_name("research", 42, "a.pdf"), "research/42-a.pdf");
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-05T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("Tue, 05 Mar 2024 10:30:00 GMT"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-05"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn unparsable_or_missing_timestamp_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(timestamp_or(Some("invalid"), now), now);
        assert_eq!(timestamp_or(Some(""), now), now);
        assert_eq!(timestamp_or(None, now), now);
    }
}
