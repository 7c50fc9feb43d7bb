use std::collections::HashMap;

use async_trait::async_trait;
use marketgate_application::DocumentBlobStore;
use marketgate_core::AppResult;
use marketgate_domain::{DocumentUpload, FileReference, RoleAssignmentId};
use tokio::sync::RwLock;

use crate::local_document_blob_store::content_reference;

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryDocumentBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns stored content for a reference.
    pub async fn get(&self, reference: &FileReference) -> Option<Vec<u8>> {
        self.blobs.read().await.get(reference.as_str()).cloned()
    }
}

#[async_trait]
impl DocumentBlobStore for InMemoryDocumentBlobStore {
    async fn put(
        &self,
        assignment_id: RoleAssignmentId,
        upload: &DocumentUpload,
    ) -> AppResult<FileReference> {
        let reference = content_reference(assignment_id, upload);
        self.blobs
            .write()
            .await
            .insert(reference.clone(), upload.bytes().to_vec());

        FileReference::new(reference)
    }
}
