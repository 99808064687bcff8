//! Represents a catalogued item: an uploaded photograph plus resolved metadata.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored catalogue item.
///
/// The `ImageRecord` row holds the resolved metadata; the original payload
/// and its thumbnail live on disk and are addressed by `id`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Internal UUID, also used to locate the payload on disk.
    pub id: Uuid,

    /// Tag number the item was matched with (may be empty).
    pub tag_number: String,

    pub title: String,
    pub description: String,
    pub price: String,
    pub gold_type: String,
    pub weight: String,
    pub gst: String,

    /// Owning collection.
    #[serde(rename = "category")]
    pub category_id: String,

    /// Resolved sub-category reference, empty when uncategorized.
    pub subcategory_id: String,
    pub subcategory_name: String,

    /// Original filename of the upload.
    pub file_name: String,

    /// Size of the original payload in bytes.
    pub size_bytes: i64,

    /// MIME type reported by the uploader.
    pub content_type: String,

    /// Size of the generated JPEG thumbnail in bytes.
    pub thumbnail_size: i64,

    pub created_at: DateTime<Utc>,
}

/// An item built by the reconciler that has not been written yet.
#[derive(Clone, Debug)]
pub struct ImageDraft {
    pub tag_number: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub gold_type: String,
    pub weight: String,
    pub gst: String,
    pub category_id: String,
    pub subcategory_id: String,
    pub subcategory_name: String,
    pub file_name: String,
    pub content_type: String,
    pub payload: Bytes,
}

/// Admin edit of an existing item. Absent fields are left unchanged.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ImagePatch {
    pub tag_number: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub gold_type: Option<String>,
    pub weight: Option<String>,
    pub gst: Option<String>,
    pub subcategory_id: Option<String>,
}
