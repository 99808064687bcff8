//! Sub-categories keyed by `{category_id}::{normalized_name}`.

use crate::errors::{CatalogueError, CatalogueResult};
use crate::models::category::{Subcategory, SubcategoryInput};
use crate::services::collection::RecordCollection;
use crate::services::normalize::{normalize_subcategory_name, subcategory_id};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct SubcategoryStore {
    collection: Arc<dyn RecordCollection<Subcategory>>,
}

impl SubcategoryStore {
    pub fn new(collection: Arc<dyn RecordCollection<Subcategory>>) -> Self {
        Self { collection }
    }

    fn build(category_id: &str, input: &SubcategoryInput) -> CatalogueResult<Subcategory> {
        let name = input.name.trim();
        if category_id.trim().is_empty() || name.is_empty() {
            return Err(CatalogueError::validation(
                "categoryId and subcategory name are required",
            ));
        }
        Ok(Subcategory {
            id: subcategory_id(category_id, name),
            category_id: category_id.to_string(),
            name: name.to_string(),
            description: input.description.trim().to_string(),
            image: input.image.clone(),
            normalized_name: normalize_subcategory_name(name),
            timestamp: Utc::now(),
        })
    }

    /// Return the sub-category called `name` under `category_id`, creating it
    /// when absent. An existing record is returned untouched.
    pub async fn ensure(&self, category_id: &str, name: &str) -> CatalogueResult<Subcategory> {
        let candidate = Self::build(
            category_id,
            &SubcategoryInput {
                name: name.to_string(),
                ..Default::default()
            },
        )?;

        if let Some(existing) = self.collection.get(&candidate.id).await? {
            debug!("sub-category {} already exists", existing.id);
            return Ok(existing);
        }

        info!("creating sub-category {}", candidate.id);
        self.collection.put(candidate).await
    }

    /// Save a sub-category entered by hand, overwriting description and image
    /// of any record with the same composite key.
    pub async fn save(
        &self,
        category_id: &str,
        input: &SubcategoryInput,
    ) -> CatalogueResult<Subcategory> {
        let record = Self::build(category_id, input)?;
        self.collection.put(record).await
    }

    pub async fn get(&self, id: &str) -> CatalogueResult<Option<Subcategory>> {
        self.collection.get(id).await
    }

    /// Sub-categories of a collection, ordered by display name.
    pub async fn list(&self, category_id: &str) -> CatalogueResult<Vec<Subcategory>> {
        let mut rows = self.collection.scan_index("categoryId", category_id).await?;
        rows.sort_by_key(|sub| sub.name.to_lowercase());
        Ok(rows)
    }

    pub async fn delete_by_category(&self, category_id: &str) -> CatalogueResult<usize> {
        let mut removed = 0;
        for sub in self.collection.scan_index("categoryId", category_id).await? {
            if self.collection.delete(&sub.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
