//! Represents an uploaded file held by the store until its single download.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generic type used when neither the client nor the filename names one.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata describing a stored object, frozen at upload time.
///
/// This is what a probe (`HEAD`) sees, and what accompanies the payload on
/// the one successful download.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// MIME type, either supplied by the uploader or inferred once at upload.
    pub content_type: String,

    /// Original filename, only known for multipart uploads.
    pub filename: Option<String>,

    /// Payload size in bytes.
    pub size: u64,

    /// When the object was uploaded.
    pub created_at: DateTime<Utc>,
}

impl ObjectMetadata {
    /// Build metadata for a new upload, inferring the content type if the
    /// uploader did not provide one.
    pub fn for_upload(
        content_type: Option<String>,
        filename: Option<String>,
        size: u64,
    ) -> Self {
        let content_type = content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| infer_content_type(filename.as_deref()));

        Self {
            content_type,
            filename,
            size,
            created_at: Utc::now(),
        }
    }
}

/// A single object owned by the store.
///
/// There is no consumed state on the record itself: consuming an object
/// removes it, so anything still reachable through the store is present.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub id: Uuid,
    pub payload: Bytes,
    pub metadata: ObjectMetadata,
}

/// Guess a MIME type from a filename extension.
///
/// Pure function of the name; unknown or missing extensions fall back to
/// `application/octet-stream`.
pub fn infer_content_type(filename: Option<&str>) -> String {
    filename
        .and_then(|name| mime_guess::from_path(name).first_raw())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}
