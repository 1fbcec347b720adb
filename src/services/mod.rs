//! Storage backends and the operations built on them.

pub mod azure_blob_store;
pub mod blob_store;
pub mod blob_xml;
pub mod catalog;
pub mod file_service;
pub mod knowledge_base_service;
pub mod local_blob_store;
pub mod upload_service;
