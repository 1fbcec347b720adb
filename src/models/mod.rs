//! Data models shared by the server handlers and the CLI client.
//!
//! `BlobItem` is what storage listings produce; `FileInfo` and
//! `KnowledgeBase` are the JSON records served over HTTP.

pub mod blob;
pub mod file_info;
pub mod knowledge_base;
