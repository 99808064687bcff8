//! MetadataImporter: maps loosely named spreadsheet columns onto the
//! canonical metadata schema and bulk-upserts them.
//!
//! Import is best effort: a row without a tag number (or one the store
//! refuses) is counted as skipped and the batch carries on. Rows are written
//! one at a time, in file order, and the batch is not a single transaction;
//! re-running the same file is safe because every write is an upsert.

use crate::errors::{CatalogueError, CatalogueResult};
use crate::models::metadata::MetadataRecord;
use crate::services::metadata_store::MetadataStore;
use crate::services::normalize::normalize_tag_number;
use crate::services::tabular::{Row, TabularParser};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Accepted column names per canonical field, highest priority first.
///
/// When a row carries several aliases for one field, the first non-empty one
/// in this order wins.
pub const FIELD_ALIASES: [(&str, &[&str]); 9] = [
    ("tagNumber", &["tagNumber", "TagNumber", "tag_number", "Tag", "tag"]),
    ("title", &["title", "Title", "itemTitle"]),
    ("description", &["description", "Description", "itemDescription"]),
    ("price", &["price", "Price"]),
    ("goldType", &["goldType", "GoldType", "gold_type", "Gold", "gold"]),
    ("weight", &["weight", "Weight"]),
    ("gst", &["gst", "GST"]),
    ("category", &["category", "Category"]),
    ("subCategory", &["subCategory", "subcategory", "SubCategory", "sub_category"]),
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct MetadataImporter {
    parser: TabularParser,
    store: MetadataStore,
}

impl MetadataImporter {
    pub fn new(parser: TabularParser, store: MetadataStore) -> Self {
        Self { parser, store }
    }

    /// Parse an uploaded file and import its rows.
    ///
    /// Parse failures abort the call; a file without data rows is rejected so
    /// the caller can tell the admin nothing was found.
    pub async fn import_file(&self, file_name: &str, data: Bytes) -> CatalogueResult<ImportSummary> {
        let rows = self.parser.parse(file_name, data).await?;
        if rows.is_empty() {
            return Err(CatalogueError::validation("No rows found in file"));
        }
        let summary = self.import_rows(&rows).await;
        info!(
            "metadata import from {}: imported {}, skipped {}",
            file_name, summary.imported, summary.skipped
        );
        Ok(summary)
    }

    /// Import already-parsed rows, one by one.
    pub async fn import_rows(&self, rows: &[Row]) -> ImportSummary {
        let mut summary = ImportSummary::default();

        for (index, row) in rows.iter().enumerate() {
            let record = canonical_record(row);
            if record.tag_number.is_empty() {
                debug!("row {} has no tag number, skipping", index + 1);
                summary.skipped += 1;
                continue;
            }

            match self.store.upsert(record).await {
                Ok(_) => summary.imported += 1,
                Err(err) => {
                    warn!("row {} not imported: {}", index + 1, err);
                    summary.skipped += 1;
                }
            }
        }

        summary
    }
}

/// First non-empty value among `aliases`, trimmed.
fn pick<'a>(row: &'a Row, aliases: &[&str]) -> &'a str {
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn field<'a>(row: &'a Row, canonical: &str) -> &'a str {
    FIELD_ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .map(|(_, aliases)| pick(row, aliases))
        .unwrap_or_default()
}

/// Map a raw row onto the canonical schema. The tag number is normalized;
/// other fields are copied as found.
pub fn canonical_record(row: &Row) -> MetadataRecord {
    MetadataRecord {
        tag_number: normalize_tag_number(Some(field(row, "tagNumber"))),
        title: field(row, "title").to_string(),
        description: field(row, "description").to_string(),
        price: field(row, "price").to_string(),
        gold_type: field(row, "goldType").to_string(),
        weight: field(row, "weight").to_string(),
        gst: field(row, "gst").to_string(),
        category: field(row, "category").to_string(),
        sub_category: field(row, "subCategory").to_string(),
        ..Default::default()
    }
}
