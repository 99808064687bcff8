//! Keyed record collections backing the metadata and sub-category stores.
//!
//! A [`RecordCollection`] offers the four operations the stores need: keyed
//! upsert, keyed lookup, scan by a named secondary index, and full scan.
//! Missing records are reported as `None`, never as errors.

use crate::errors::{CatalogueError, CatalogueResult};
use crate::models::{category::Subcategory, metadata::MetadataRecord};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

#[async_trait]
pub trait RecordCollection<R>: Send + Sync {
    /// Insert or overwrite `record` under its key and return what was stored.
    async fn put(&self, record: R) -> CatalogueResult<R>;

    async fn get(&self, key: &str) -> CatalogueResult<Option<R>>;

    /// All records whose indexed `field` equals `value`.
    async fn scan_index(&self, field: &str, value: &str) -> CatalogueResult<Vec<R>>;

    async fn scan_all(&self) -> CatalogueResult<Vec<R>>;

    async fn delete(&self, key: &str) -> CatalogueResult<bool>;
}

fn unknown_index(collection: &str, field: &str) -> CatalogueError {
    CatalogueError::validation(format!("`{}` has no index on `{}`", collection, field))
}

const METADATA_COLUMNS: &str = "tag_number, title, description, price, gold_type, weight, gst, \
                                category, sub_category, timestamp";

/// `product_metadata` table, keyed by tag number, indexed by category.
#[derive(Clone)]
pub struct SqliteMetadataCollection {
    db: Arc<SqlitePool>,
}

impl SqliteMetadataCollection {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordCollection<MetadataRecord> for SqliteMetadataCollection {
    async fn put(&self, record: MetadataRecord) -> CatalogueResult<MetadataRecord> {
        let stored = sqlx::query_as::<_, MetadataRecord>(&format!(
            r#"
            INSERT INTO product_metadata ({METADATA_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tag_number) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                price = excluded.price,
                gold_type = excluded.gold_type,
                weight = excluded.weight,
                gst = excluded.gst,
                category = excluded.category,
                sub_category = excluded.sub_category,
                timestamp = excluded.timestamp
            RETURNING {METADATA_COLUMNS}
            "#
        ))
        .bind(&record.tag_number)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.price)
        .bind(&record.gold_type)
        .bind(&record.weight)
        .bind(&record.gst)
        .bind(&record.category)
        .bind(&record.sub_category)
        .bind(record.timestamp)
        .fetch_one(&*self.db)
        .await?;
        Ok(stored)
    }

    async fn get(&self, key: &str) -> CatalogueResult<Option<MetadataRecord>> {
        let record = sqlx::query_as::<_, MetadataRecord>(&format!(
            "SELECT {METADATA_COLUMNS} FROM product_metadata WHERE tag_number = ?"
        ))
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn scan_index(&self, field: &str, value: &str) -> CatalogueResult<Vec<MetadataRecord>> {
        if field != "category" {
            return Err(unknown_index("product_metadata", field));
        }
        let rows = sqlx::query_as::<_, MetadataRecord>(&format!(
            "SELECT {METADATA_COLUMNS} FROM product_metadata WHERE category = ?"
        ))
        .bind(value)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn scan_all(&self) -> CatalogueResult<Vec<MetadataRecord>> {
        let rows = sqlx::query_as::<_, MetadataRecord>(&format!(
            "SELECT {METADATA_COLUMNS} FROM product_metadata"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, key: &str) -> CatalogueResult<bool> {
        let result = sqlx::query("DELETE FROM product_metadata WHERE tag_number = ?")
            .bind(key)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

const SUBCATEGORY_COLUMNS: &str =
    "id, category_id, name, description, image, normalized_name, timestamp";

/// `subcategories` table, keyed by composite id, indexed by category id.
#[derive(Clone)]
pub struct SqliteSubcategoryCollection {
    db: Arc<SqlitePool>,
}

impl SqliteSubcategoryCollection {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordCollection<Subcategory> for SqliteSubcategoryCollection {
    async fn put(&self, record: Subcategory) -> CatalogueResult<Subcategory> {
        let stored = sqlx::query_as::<_, Subcategory>(&format!(
            r#"
            INSERT INTO subcategories ({SUBCATEGORY_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                image = excluded.image,
                timestamp = excluded.timestamp
            RETURNING {SUBCATEGORY_COLUMNS}
            "#
        ))
        .bind(&record.id)
        .bind(&record.category_id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.image)
        .bind(&record.normalized_name)
        .bind(record.timestamp)
        .fetch_one(&*self.db)
        .await?;
        Ok(stored)
    }

    async fn get(&self, key: &str) -> CatalogueResult<Option<Subcategory>> {
        let record = sqlx::query_as::<_, Subcategory>(&format!(
            "SELECT {SUBCATEGORY_COLUMNS} FROM subcategories WHERE id = ?"
        ))
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn scan_index(&self, field: &str, value: &str) -> CatalogueResult<Vec<Subcategory>> {
        if field != "categoryId" {
            return Err(unknown_index("subcategories", field));
        }
        let rows = sqlx::query_as::<_, Subcategory>(&format!(
            "SELECT {SUBCATEGORY_COLUMNS} FROM subcategories WHERE category_id = ?"
        ))
        .bind(value)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn scan_all(&self) -> CatalogueResult<Vec<Subcategory>> {
        let rows = sqlx::query_as::<_, Subcategory>(&format!(
            "SELECT {SUBCATEGORY_COLUMNS} FROM subcategories"
        ))
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, key: &str) -> CatalogueResult<bool> {
        let result = sqlx::query("DELETE FROM subcategories WHERE id = ?")
            .bind(key)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory collection for exercising the stores without SQLite.

    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// How a record exposes its key and indexed fields to [`MemoryCollection`].
    pub trait Keyed: Clone + Send + Sync {
        fn key(&self) -> String;
        fn index_value(&self, field: &str) -> Option<String>;
    }

    impl Keyed for MetadataRecord {
        fn key(&self) -> String {
            self.tag_number.clone()
        }

        fn index_value(&self, field: &str) -> Option<String> {
            (field == "category").then(|| self.category.clone())
        }
    }

    impl Keyed for Subcategory {
        fn key(&self) -> String {
            self.id.clone()
        }

        fn index_value(&self, field: &str) -> Option<String> {
            (field == "categoryId").then(|| self.category_id.clone())
        }
    }

    pub struct MemoryCollection<R> {
        records: Mutex<BTreeMap<String, R>>,
    }

    impl<R> Default for MemoryCollection<R> {
        fn default() -> Self {
            Self {
                records: Mutex::new(BTreeMap::new()),
            }
        }
    }

    impl<R: Keyed> MemoryCollection<R> {
        pub fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl<R: Keyed + 'static> RecordCollection<R> for MemoryCollection<R> {
        async fn put(&self, record: R) -> CatalogueResult<R> {
            self.records
                .lock()
                .unwrap()
                .insert(record.key(), record.clone());
            Ok(record)
        }

        async fn get(&self, key: &str) -> CatalogueResult<Option<R>> {
            Ok(self.records.lock().unwrap().get(key).cloned())
        }

        async fn scan_index(&self, field: &str, value: &str) -> CatalogueResult<Vec<R>> {
            let records = self.records.lock().unwrap();
            let mut matched = Vec::new();
            for record in records.values() {
                match record.index_value(field) {
                    Some(indexed) if indexed == value => matched.push(record.clone()),
                    Some(_) => {}
                    None => return Err(unknown_index("memory", field)),
                }
            }
            Ok(matched)
        }

        async fn scan_all(&self) -> CatalogueResult<Vec<R>> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }

        async fn delete(&self, key: &str) -> CatalogueResult<bool> {
            Ok(self.records.lock().unwrap().remove(key).is_some())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::Utc;

    fn record(tag: &str, title: &str, category: &str) -> MetadataRecord {
        MetadataRecord {
            tag_number: tag.into(),
            title: title.into(),
            category: category.into(),
            timestamp: Utc::now(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sqlite_put_overwrites_by_tag() {
        let collection = SqliteMetadataCollection::new(test_pool().await);
        collection.put(record("ABJ-1", "Ring", "gold-rings")).await.unwrap();
        let stored = collection
            .put(record("ABJ-1", "Ring v2", "gold-rings"))
            .await
            .unwrap();

        assert_eq!(stored.title, "Ring v2");
        assert_eq!(collection.scan_all().await.unwrap().len(), 1);
        assert_eq!(
            collection.get("ABJ-1").await.unwrap().map(|r| r.title),
            Some("Ring v2".to_string())
        );
        assert!(collection.get("ABJ-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_index_scan_filters_and_rejects_unknown_fields() {
        let collection = SqliteMetadataCollection::new(test_pool().await);
        collection.put(record("ABJ-1", "Ring", "gold-rings")).await.unwrap();
        collection.put(record("ABJ-2", "Chain", "pearl-jewelry")).await.unwrap();

        let rings = collection.scan_index("category", "gold-rings").await.unwrap();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].tag_number, "ABJ-1");

        let err = collection.scan_index("price", "1").await.unwrap_err();
        assert!(matches!(err, CatalogueError::Validation(_)));
    }

    #[tokio::test]
    async fn sqlite_delete_reports_whether_a_row_went_away() {
        let collection = SqliteMetadataCollection::new(test_pool().await);
        collection.put(record("ABJ-1", "Ring", "")).await.unwrap();
        assert!(collection.delete("ABJ-1").await.unwrap());
        assert!(!collection.delete("ABJ-1").await.unwrap());
    }
}
