//! Represents one row of imported product metadata, keyed by tag number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Canonical header names, in export order.
pub const METADATA_HEADERS: [&str; 9] = [
    "tagNumber",
    "title",
    "description",
    "price",
    "goldType",
    "weight",
    "gst",
    "category",
    "subCategory",
];

/// Product metadata imported from a spreadsheet or entered directly.
///
/// At most one record exists per normalized tag number; writing the same tag
/// again overwrites the previous values.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataRecord {
    /// Normalized (trimmed, uppercase) tag number.
    pub tag_number: String,

    pub title: String,
    pub description: String,
    pub price: String,
    pub gold_type: String,
    pub weight: String,
    pub gst: String,

    /// Collection hint from the source sheet (free-form).
    pub category: String,

    /// Sub-category display name; the reconciler creates it on demand.
    pub sub_category: String,

    /// When this record was last written.
    pub timestamp: DateTime<Utc>,
}

impl MetadataRecord {
    /// Value of a canonical field by its header name.
    pub fn field(&self, header: &str) -> Option<&str> {
        let value = match header {
            "tagNumber" => &self.tag_number,
            "title" => &self.title,
            "description" => &self.description,
            "price" => &self.price,
            "goldType" => &self.gold_type,
            "weight" => &self.weight,
            "gst" => &self.gst,
            "category" => &self.category,
            "subCategory" => &self.sub_category,
            _ => return None,
        };
        Some(value.as_str())
    }
}
