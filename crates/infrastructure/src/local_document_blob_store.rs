use std::path::{Path, PathBuf};

use async_trait::async_trait;
use marketgate_application::DocumentBlobStore;
use marketgate_core::{AppError, AppResult};
use marketgate_domain::{DocumentUpload, FileReference, RoleAssignmentId};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Filesystem blob store keyed by content hash.
///
/// Files land at `<root>/<assignment id>/<sha256>.<ext>`, so storing the same
/// content twice for one assignment reuses the file.
#[derive(Debug, Clone)]
pub struct LocalDocumentBlobStore {
    root: PathBuf,
}

impl LocalDocumentBlobStore {
    /// Creates a store writing below `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the directory the store writes to.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }
}

/// Builds the relative reference for an upload.
pub(crate) fn content_reference(assignment_id: RoleAssignmentId, upload: &DocumentUpload) -> String {
    let digest = hex::encode(Sha256::digest(upload.bytes()));
    format!(
        "{assignment_id}/{digest}.{}",
        upload.mime_type().extension()
    )
}

#[async_trait]
impl DocumentBlobStore for LocalDocumentBlobStore {
    async fn put(
        &self,
        assignment_id: RoleAssignmentId,
        upload: &DocumentUpload,
    ) -> AppResult<FileReference> {
        let reference = content_reference(assignment_id, upload);
        let path = self.root.join(&reference);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                AppError::Persistence(format!(
                    "failed to create document directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        tokio::fs::write(&path, upload.bytes())
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to write document '{}': {error}",
                    path.display()
                ))
            })?;

        debug!(%assignment_id, reference, size = upload.size_bytes(), "document stored");
        FileReference::new(reference)
    }
}
