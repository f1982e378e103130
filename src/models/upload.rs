//! Represents a completed upload persisted locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{privacy::Privacy, video::UploadResponse};

/// Content type stamped on every record created by the upload workflow.
pub const RECORD_TYPE: &str = "dgv-upload";

/// Status given to records at creation time.
pub const STATUS_PUBLISH: &str = "publish";

/// Metadata key holding the privacy settings sent to Vimeo.
pub const META_PRIVACY: &str = "dgv_privacy";

/// Metadata key holding the raw Vimeo response.
pub const META_RESPONSE: &str = "dgv_response";

/// A single upload record.
///
/// The row only carries the descriptive fields; privacy and the Vimeo
/// response live in `upload_meta` and are attached by the record store.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadRecord {
    /// Opaque identifier assigned at creation.
    pub id: Uuid,

    /// Display name with HTML tags stripped.
    pub title: String,

    /// Free text body, stored verbatim.
    pub description: String,

    /// Publication status (always `publish` for now).
    pub status: String,

    /// Custom content type, see [`RECORD_TYPE`].
    pub record_type: String,

    /// User who performed the upload.
    pub author_id: i64,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Fields required to create an [`UploadRecord`].
#[derive(Debug, Clone)]
pub struct NewUploadRecord {
    pub title: String,
    pub description: String,
    pub author_id: i64,
}

/// Listing entry returned by `GET /uploads`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub id: Uuid,
    pub title: String,
    pub vimeo_id: Option<String>,
}

/// A record joined with its metadata.
#[derive(Serialize, Debug, Clone)]
pub struct UploadDetails {
    #[serde(flatten)]
    pub record: UploadRecord,
    pub privacy: Option<Privacy>,
    pub response: Option<UploadResponse>,
    pub vimeo_id: Option<String>,
}
