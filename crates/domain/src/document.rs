//! Verification documents and upload validation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use marketgate_core::{AppError, AppResult, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RoleAssignmentId;

/// Upper bound for any uploaded verification document.
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Canonical verification document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Government-issued identity document.
    Id,
    /// Business or operating permit.
    Permit,
    /// Anything else the applicant attached.
    Other,
}

impl DocumentType {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Permit => "permit",
            Self::Other => "other",
        }
    }

    /// Maps free-form input onto the canonical set. Unrecognized input is `Other`.
    #[must_use]
    pub fn canonicalize(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "id" | "government_id" | "gov_id" | "govt_id" | "national_id" | "valid_id"
            | "id_card" | "passport" | "drivers_license" | "identity" | "photo_id" => Self::Id,
            "permit" | "business_permit" | "permit_document" | "mayors_permit"
            | "business_license" | "license" | "operating_permit" => Self::Permit,
            _ => Self::Other,
        }
    }

    /// Parses a storage string written by this crate.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "id" => Ok(Self::Id),
            "permit" => Ok(Self::Permit),
            "other" => Ok(Self::Other),
            _ => Err(AppError::Validation(format!(
                "unknown document type '{value}'"
            ))),
        }
    }

    /// Returns whether this type can stand in as identity evidence.
    #[must_use]
    pub fn is_identity_class(&self) -> bool {
        matches!(self, Self::Id | Self::Permit)
    }
}

/// Review status of a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Awaiting review.
    Pending,
    /// Accepted by a reviewer.
    Approved,
    /// Refused by a reviewer.
    Rejected,
}

impl DocumentStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(AppError::Validation(format!(
                "unknown document status '{value}'"
            ))),
        }
    }
}

/// Unique identifier for a verification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a random document identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a document identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Opaque pointer into the document blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileReference(String);

impl FileReference {
    /// Wraps a reference produced by a blob store.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "file reference must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Accepted document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentMimeType {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `application/pdf`, bootstrap uploads only.
    Pdf,
}

impl DocumentMimeType {
    /// Parses a declared MIME type.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "application/pdf" => Ok(Self::Pdf),
            other => Err(AppError::Validation(format!(
                "unsupported document type '{other}'"
            ))),
        }
    }

    /// Returns the canonical MIME string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Pdf => "application/pdf",
        }
    }

    /// Returns the file extension used by blob stores.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Pdf => "pdf",
        }
    }

    fn matches_signature(&self, bytes: &[u8]) -> bool {
        match self {
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            Self::Pdf => bytes.starts_with(b"%PDF"),
        }
    }
}

/// Path through which a document enters the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadContext {
    /// Attached while the assignment is created. PDF is allowed here.
    Bootstrap,
    /// Uploaded by the applicant after a rejection or resubmission request.
    Resubmission,
}

impl UploadContext {
    fn accepts(&self, mime_type: DocumentMimeType) -> bool {
        match self {
            Self::Bootstrap => true,
            Self::Resubmission => mime_type != DocumentMimeType::Pdf,
        }
    }
}

/// A validated upload waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    doc_type: DocumentType,
    mime_type: DocumentMimeType,
    bytes: Vec<u8>,
}

impl DocumentUpload {
    /// Validates type, declared MIME type, content signature and size.
    pub fn new(
        raw_doc_type: &str,
        declared_mime_type: &str,
        bytes: Vec<u8>,
        context: UploadContext,
    ) -> AppResult<Self> {
        if bytes.is_empty() {
            return Err(AppError::Validation(
                "uploaded document must not be empty".to_owned(),
            ));
        }

        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(AppError::Validation(format!(
                "uploaded document exceeds the {MAX_DOCUMENT_BYTES} byte limit"
            )));
        }

        let mime_type = DocumentMimeType::parse(declared_mime_type)?;
        if !context.accepts(mime_type) {
            return Err(AppError::Validation(format!(
                "'{}' uploads are only accepted at account creation",
                mime_type.as_str()
            )));
        }

        if !mime_type.matches_signature(&bytes) {
            return Err(AppError::Validation(format!(
                "uploaded content is not a valid '{}' file",
                mime_type.as_str()
            )));
        }

        Ok(Self {
            doc_type: DocumentType::canonicalize(raw_doc_type),
            mime_type,
            bytes,
        })
    }

    /// Returns the canonical document type.
    #[must_use]
    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    /// Returns the verified MIME type.
    #[must_use]
    pub fn mime_type(&self) -> DocumentMimeType {
        self.mime_type
    }

    /// Returns the raw file content.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Document attached to one role assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationDocument {
    /// Stable document identifier.
    pub id: DocumentId,
    /// Owning role assignment.
    pub role_assignment_id: RoleAssignmentId,
    /// Canonical document type.
    pub doc_type: DocumentType,
    /// Current review status.
    pub status: DocumentStatus,
    /// Blob store reference of the current file.
    pub file_reference: FileReference,
    /// MIME type of the current file.
    pub mime_type: DocumentMimeType,
    /// Size of the current file.
    pub size_bytes: i64,
    /// Append-only reviewer trail.
    pub admin_notes: String,
    /// Last reviewer, if any.
    pub reviewed_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl VerificationDocument {
    /// Creates a pending document for a stored upload.
    #[must_use]
    pub fn new_pending(
        role_assignment_id: RoleAssignmentId,
        upload: &DocumentUpload,
        file_reference: FileReference,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            role_assignment_id,
            doc_type: upload.doc_type(),
            status: DocumentStatus::Pending,
            file_reference,
            mime_type: upload.mime_type(),
            size_bytes: i64::try_from(upload.size_bytes()).unwrap_or(i64::MAX),
            admin_notes: String::new(),
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the document approved.
    pub fn approve(&mut self, reviewer: UserId, now: DateTime<Utc>) {
        self.status = DocumentStatus::Approved;
        self.reviewed_by = Some(reviewer);
        self.updated_at = now;
        append_line(&mut self.admin_notes, now, &format!("approved by {reviewer}"));
    }

    /// Marks the document rejected with the reviewer's reason.
    pub fn reject(&mut self, reviewer: UserId, reason: &str, now: DateTime<Utc>) {
        self.status = DocumentStatus::Rejected;
        self.reviewed_by = Some(reviewer);
        self.updated_at = now;
        append_line(
            &mut self.admin_notes,
            now,
            &format!("rejected by {reviewer}: {reason}"),
        );
    }

    /// Swaps in a resubmitted file, keeping the previous reference in the notes.
    pub fn replace_file(
        &mut self,
        upload: &DocumentUpload,
        file_reference: FileReference,
        now: DateTime<Utc>,
    ) {
        let previous = format!(
            "resubmitted; previous {} file '{}' was {}",
            self.doc_type.as_str(),
            self.file_reference.as_str(),
            self.status.as_str()
        );
        append_line(&mut self.admin_notes, now, &previous);
        self.file_reference = file_reference;
        self.mime_type = upload.mime_type();
        self.size_bytes = i64::try_from(upload.size_bytes()).unwrap_or(i64::MAX);
        self.status = DocumentStatus::Pending;
        self.reviewed_by = None;
        self.updated_at = now;
    }
}

/// Returns the governing (latest) document per type.
#[must_use]
pub fn latest_by_type(
    documents: &[VerificationDocument],
) -> BTreeMap<DocumentType, &VerificationDocument> {
    let mut latest: BTreeMap<DocumentType, &VerificationDocument> = BTreeMap::new();
    for document in documents {
        let replace = latest.get(&document.doc_type).is_none_or(|current| {
            (document.created_at, document.updated_at) > (current.created_at, current.updated_at)
        });
        if replace {
            latest.insert(document.doc_type, document);
        }
    }

    latest
}

/// Returns the governing status per type.
#[must_use]
pub fn latest_statuses(documents: &[VerificationDocument]) -> BTreeMap<DocumentType, DocumentStatus> {
    latest_by_type(documents)
        .into_iter()
        .map(|(doc_type, document)| (doc_type, document.status))
        .collect()
}

pub(crate) fn append_line(notes: &mut String, now: DateTime<Utc>, line: &str) {
    if !notes.is_empty() {
        notes.push('\n');
    }
    notes.push_str(&format!("[{}] {line}", now.format("%Y-%m-%d %H:%M:%S")));
}
