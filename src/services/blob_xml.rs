//! Deserializing the XML documents returned by the blob service REST API.
//!
//! Only the elements the store needs are mapped; everything else in the
//! response is skipped by serde.

use crate::models::blob::{BlobItem, BlobMetadata};
use crate::services::catalog;
use quick_xml::DeError;
use serde::Deserialize;

/// One page of a List Blobs response.
#[derive(Debug, Default)]
pub struct ListBlobsPage {
    pub blobs: Vec<BlobItem>,
    pub next_marker: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Deserialize, Default)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    blobs: Vec<BlobEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobEntry {
    name: String,
    #[serde(default)]
    properties: BlobProperties,
    #[serde(default)]
    metadata: BlobMetadata,
}

#[derive(Deserialize, Default)]
struct BlobProperties {
    #[serde(rename = "Content-Length", default)]
    content_length: Option<String>,
    #[serde(rename = "Content-Type", default)]
    content_type: Option<String>,
    #[serde(rename = "Creation-Time", default)]
    creation_time: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Parse an `EnumerationResults` document.
pub fn parse_list_blobs(xml: &str) -> Result<ListBlobsPage, String> {
    let results: EnumerationResults = from_str(xml).map_err(|err| err.to_string())?;

    let blobs = results
        .blobs
        .blobs
        .into_iter()
        .map(BlobEntry::into_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ListBlobsPage {
        blobs,
        next_marker: non_empty(results.next_marker),
    })
}

/// `<Message>` of a service error body, if the body is one.
pub fn error_message(xml: &str) -> Option<String> {
    from_str::<ErrorBody>(xml)
        .ok()
        .and_then(|body| non_empty(body.message))
}

impl BlobEntry {
    fn into_item(self) -> Result<BlobItem, String> {
        let content_length = match non_empty(self.properties.content_length) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| format!("invalid Content-Length `{}`", raw))?,
            None => 0,
        };

        Ok(BlobItem {
            name: self.name,
            content_length,
            content_type: non_empty(self.properties.content_type),
            created_on: self
                .properties
                .creation_time
                .as_deref()
                .and_then(catalog::parse_timestamp),
            metadata: decode_metadata(self.metadata),
        })
    }
}

/// Undo the percent-encoding applied to metadata values on write. Values
/// that do not decode to UTF-8 are kept as listed.
fn decode_metadata(metadata: BlobMetadata) -> BlobMetadata {
    metadata
        .into_iter()
        .map(|(key, value)| {
            let decoded = match urlencoding::decode(&value) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => value,
            };
            (key, decoded)
        })
        .collect()
}

fn from_str<'de, T: Deserialize<'de>>(xml: &'de str) -> Result<T, DeError> {
    quick_xml::de::from_str(xml.trim_start_matches('\u{feff}'))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
