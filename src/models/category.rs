//! Collections (top-level categories) and the sub-categories inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A top-level collection of catalogue items.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,

    /// Display name, unique across collections.
    pub name: String,

    pub description: String,

    /// Cover image as a URL or data URI.
    pub image: String,

    /// Listing order (ascending).
    pub timestamp: DateTime<Utc>,
}

/// A collection together with the number of items it holds.
#[derive(Serialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub item_count: i64,
}

/// Fields accepted when creating or editing a collection.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryInput {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
}

/// A grouping inside a collection.
///
/// The id is `{category_id}::{normalized_name}`, so two sub-categories whose
/// names differ only by case or surrounding whitespace collapse into one.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: String,
    pub category_id: String,

    /// Trimmed display name as first entered.
    pub name: String,

    pub description: String,
    pub image: String,

    /// Lowercased name used only for the composite key.
    pub normalized_name: String,

    pub timestamp: DateTime<Utc>,
}

/// Fields accepted when an admin saves a sub-category by hand.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SubcategoryInput {
    pub name: String,
    pub description: String,
    pub image: String,
}
