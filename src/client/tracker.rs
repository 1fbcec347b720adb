//! Optimistic status of uploads made in this session.
//!
//! The server never reports an upload's progress; it only lists what has
//! reached the processed container. A tracked upload is `Uploaded` when the
//! request succeeds and becomes `Processed` once a protected document
//! derived from it shows up in a listing.

use crate::{
    client::api_client::{ACCEPTED_EXTENSIONS, UploadReceipt},
    models::file_info::{FileInfo, FileStatus},
    services::catalog::PROTECTED_PREFIX,
};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TrackedUpload {
    pub path: PathBuf,
    pub receipt: Option<UploadReceipt>,
    pub status: FileStatus,
    pub message: String,
}

impl TrackedUpload {
    pub fn succeeded(path: PathBuf, receipt: UploadReceipt) -> Self {
        Self {
            path,
            message: receipt.message.clone(),
            receipt: Some(receipt),
            status: FileStatus::Uploaded,
        }
    }

    pub fn failed(path: PathBuf, error: &anyhow::Error) -> Self {
        Self {
            path,
            receipt: None,
            status: FileStatus::Error,
            message: format!("Upload failed: {}", error),
        }
    }

    /// A file refused before upload because of its type.
    pub fn rejected(path: PathBuf) -> Self {
        Self {
            path,
            receipt: None,
            status: FileStatus::Error,
            message: format!("Unsupported file type; accepted: {}", ACCEPTED_EXTENSIONS),
        }
    }

    /// Re-project the status from a fresh listing. Failed uploads stay
    /// failed; anything not yet visible is still processing.
    pub fn refresh(&mut self, listed: &[FileInfo]) {
        let Some(receipt) = &self.receipt else {
            return;
        };
        let uploaded = receipt
            .blob_name
            .rsplit('/')
            .next()
            .unwrap_or(&receipt.blob_name);
        let expected = format!("{}{}", PROTECTED_PREFIX, uploaded);

        match listed.iter().find(|f| simple_name(&f.blob_name).starts_with(&expected)) {
            Some(found) => {
                self.status = FileStatus::Processed;
                self.message = found
                    .message
                    .clone()
                    .unwrap_or_else(|| "Document processed".to_string());
            }
            None => {
                self.status = FileStatus::Processing;
                self.message = "Waiting for processing".to_string();
            }
        }
    }
}

fn simple_name(blob_name: &str) -> &str {
    blob_name.rsplit('/').next().unwrap_or(blob_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn receipt(blob_name: &str) -> UploadReceipt {
        UploadReceipt {
            success: true,
            message: "File uploaded successfully".into(),
            blob_name: blob_name.into(),
            knowledge_base: "research".into(),
            file_size: 4,
            file_type: "application/pdf".into(),
            virtual_path: Some("research".into()),
        }
    }

    fn listed(blob_name: &str) -> FileInfo {
        FileInfo {
            id: format!("processed-{}", blob_name),
            name: blob_name.into(),
            size: 1,
            content_type: "text/markdown".into(),
            status: FileStatus::Processed,
            upload_time: Utc::now(),
            process_time: None,
            knowledge_base: "research".into(),
            blob_name: blob_name.into(),
            container: "processed".into(),
            message: Some("Document processed and added to research knowledge base".into()),
        }
    }

    #[test]
    fn becomes_processed_once_protected_output_is_listed() {
        let mut upload = TrackedUpload::succeeded("report.pdf".into(), receipt("research/17-report.pdf"));
        assert_eq!(upload.status, FileStatus::Uploaded);

        upload.refresh(&[listed("research/protected_other.pdf.md")]);
        assert_eq!(upload.status, FileStatus::Processing);

        upload.refresh(&[listed("research/protected_17-report.pdf.md")]);
        assert_eq!(upload.status, FileStatus::Processed);
        assert!(upload.message.contains("research knowledge base"));
    }

    #[test]
    fn failed_upload_stays_failed() {
        let err = anyhow::anyhow!("server returned 500: Upload failed");
        let mut upload = TrackedUpload::failed("a.pdf".into(), &err);
        upload.refresh(&[listed("protected_a.pdf.md")]);
        assert_eq!(upload.status, FileStatus::Error);
    }

    #[test]
    fn rejected_file_is_an_error_that_never_resolves() {
        let mut upload = TrackedUpload::rejected("photo.png".into());
        assert_eq!(upload.status, FileStatus::Error);
        assert!(upload.message.contains(".docx"));
        upload.refresh(&[listed("protected_photo.png.md")]);
        assert_eq!(upload.status, FileStatus::Error);
    }
}
