//! MetadataStore: product metadata keyed by normalized tag number.

use crate::errors::{CatalogueError, CatalogueResult};
use crate::models::metadata::{METADATA_HEADERS, MetadataRecord};
use crate::services::collection::RecordCollection;
use crate::services::normalize::normalize_tag_number;
use crate::services::tabular::{CsvRow, write_csv};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

impl CsvRow for MetadataRecord {
    fn cell(&self, header: &str) -> Option<&str> {
        self.field(header)
    }
}

#[derive(Clone)]
pub struct MetadataStore {
    collection: Arc<dyn RecordCollection<MetadataRecord>>,
}

impl MetadataStore {
    pub fn new(collection: Arc<dyn RecordCollection<MetadataRecord>>) -> Self {
        Self { collection }
    }

    /// Write `record` under its normalized tag number, replacing any previous
    /// record with that tag. The timestamp is set to now.
    pub async fn upsert(&self, mut record: MetadataRecord) -> CatalogueResult<MetadataRecord> {
        let tag = normalize_tag_number(Some(&record.tag_number));
        if tag.is_empty() {
            return Err(CatalogueError::validation("tagNumber is required"));
        }
        record.tag_number = tag;
        record.timestamp = Utc::now();
        debug!("upserting metadata for {}", record.tag_number);
        self.collection.put(record).await
    }

    /// Look up by tag number (normalized first). Blank tags are never found.
    pub async fn get(&self, tag_number: &str) -> CatalogueResult<Option<MetadataRecord>> {
        let tag = normalize_tag_number(Some(tag_number));
        if tag.is_empty() {
            return Ok(None);
        }
        self.collection.get(&tag).await
    }

    /// Every record, ordered by tag number.
    pub async fn list_all(&self) -> CatalogueResult<Vec<MetadataRecord>> {
        let mut rows = self.collection.scan_all().await?;
        rows.sort_by(|a, b| a.tag_number.cmp(&b.tag_number));
        Ok(rows)
    }

    /// Records whose `category` column equals `category`, ordered by tag number.
    pub async fn list_by_category(&self, category: &str) -> CatalogueResult<Vec<MetadataRecord>> {
        let mut rows = self.collection.scan_index("category", category).await?;
        rows.sort_by(|a, b| a.tag_number.cmp(&b.tag_number));
        Ok(rows)
    }

    /// All records as CSV with the canonical headers.
    pub async fn export_csv(&self) -> CatalogueResult<String> {
        let rows = self.list_all().await?;
        Ok(write_csv(&METADATA_HEADERS, &rows))
    }
}

/// Downloadable import template: canonical headers plus two sample rows.
pub fn metadata_template() -> String {
    let samples = [
        MetadataRecord {
            tag_number: "ABJ-1001".into(),
            title: "Gold Necklace".into(),
            description: "Temple design necklace".into(),
            price: "125000".into(),
            gold_type: "22K".into(),
            weight: "28.45 g".into(),
            gst: "3%".into(),
            category: "gold-rings".into(),
            sub_category: "Bridal".into(),
            ..Default::default()
        },
        MetadataRecord {
            tag_number: "ABJ-1002".into(),
            title: "Diamond Ring".into(),
            description: "Solitaire ring".into(),
            price: "78500".into(),
            gold_type: "18K".into(),
            weight: "6.20 g".into(),
            gst: "3%".into(),
            category: "diamond-necklaces".into(),
            sub_category: "Daily Wear".into(),
            ..Default::default()
        },
    ];
    write_csv(&METADATA_HEADERS, &samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::collection::memory::MemoryCollection;
    use crate::services::tabular::parse_csv;

    fn store() -> (MetadataStore, Arc<MemoryCollection<MetadataRecord>>) {
        let collection = Arc::new(MemoryCollection::default());
        (MetadataStore::new(collection.clone()), collection)
    }

    fn record(tag: &str, title: &str) -> MetadataRecord {
        MetadataRecord {
            tag_number: tag.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upsert_normalizes_key_and_stamps_time() {
        let (store, collection) = store();
        let before = Utc::now();
        let stored = store.upsert(record("  abj-1 ", "Ring")).await.unwrap();

        assert_eq!(stored.tag_number, "ABJ-1");
        assert!(stored.timestamp >= before);
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn upsert_rejects_blank_tag() {
        let (store, collection) = store();
        let err = store.upsert(record("   ", "Bad")).await.unwrap_err();
        assert!(matches!(err, CatalogueError::Validation(_)));
        assert_eq!(collection.len(), 0);
    }

    #[tokio::test]
    async fn same_tag_overwrites() {
        let (store, collection) = store();
        store.upsert(record("ABJ-1", "Ring")).await.unwrap();
        store.upsert(record("abj-1", "Ring v2")).await.unwrap();

        assert_eq!(collection.len(), 1);
        let found = store.get("Abj-1").await.unwrap().unwrap();
        assert_eq!(found.title, "Ring v2");
    }

    #[tokio::test]
    async fn missing_and_blank_lookups_are_none() {
        let (store, _) = store();
        assert!(store.get("ABJ-404").await.unwrap().is_none());
        assert!(store.get("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_all_is_sorted_by_tag() {
        let (store, _) = store();
        for tag in ["ABJ-3", "ABJ-1", "ABJ-2"] {
            store.upsert(record(tag, "x")).await.unwrap();
        }
        let tags: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.tag_number)
            .collect();
        assert_eq!(tags, ["ABJ-1", "ABJ-2", "ABJ-3"]);
    }

    #[tokio::test]
    async fn export_quotes_every_value() {
        let (store, _) = store();
        store
            .upsert(MetadataRecord {
                tag_number: "ABJ-1".into(),
                title: "Ring, \"classic\"".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let csv = store.export_csv().await.unwrap();
        assert_eq!(
            csv,
            "tagNumber,title,description,price,goldType,weight,gst,category,subCategory\n\
             \"ABJ-1\",\"Ring, \"\"classic\"\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\""
        );
        assert_eq!(parse_csv(&csv)[0]["title"], "Ring, \"classic\"");
    }

    #[test]
    fn template_parses_back_into_two_rows() {
        let rows = parse_csv(&metadata_template());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["tagNumber"], "ABJ-1001");
        assert_eq!(rows[1]["subCategory"], "Daily Wear");
    }
}
