//! ImageReconciler: joins an uploaded photograph to imported metadata.
//!
//! The tag number comes from the file name (`ABJ-1001.jpg` -> `ABJ-1001`),
//! or from the manual form when exactly one file is uploaded. Imported
//! metadata beats manual form values field by field; the reconciled item is
//! returned as an [`ImageDraft`] for the caller to thumbnail and persist.

use crate::errors::CatalogueResult;
use crate::models::{category::Subcategory, image::ImageDraft, metadata::MetadataRecord};
use crate::services::metadata_store::MetadataStore;
use crate::services::normalize::{normalize_tag_number, tag_from_filename};
use crate::services::subcategory_store::SubcategoryStore;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

/// An uploaded file as received from the client.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Values typed into the upload form; they apply to every file in the batch.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualFields {
    pub tag_number: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub gold_type: String,
    pub weight: String,
    pub gst: String,
    /// Sub-category picked in the form, if any.
    pub subcategory_id: String,
}

/// Per-batch state shared by every file of one upload.
#[derive(Clone, Debug)]
pub struct UploadContext {
    pub category_id: String,
    pub manual: ManualFields,
    pub selected_subcategory: Option<Subcategory>,
    pub batch_size: usize,
}

#[derive(Clone)]
pub struct ImageReconciler {
    metadata: MetadataStore,
    subcategories: SubcategoryStore,
}

impl ImageReconciler {
    pub fn new(metadata: MetadataStore, subcategories: SubcategoryStore) -> Self {
        Self {
            metadata,
            subcategories,
        }
    }

    /// Resolve the manually selected sub-category (ignored unless it exists
    /// under `category_id`) and capture the batch size.
    pub async fn context(
        &self,
        category_id: &str,
        manual: ManualFields,
        batch_size: usize,
    ) -> CatalogueResult<UploadContext> {
        let selected_id = manual.subcategory_id.trim();
        let selected_subcategory = if selected_id.is_empty() {
            None
        } else {
            self.subcategories
                .get(selected_id)
                .await?
                .filter(|sub| sub.category_id == category_id)
        };

        Ok(UploadContext {
            category_id: category_id.to_string(),
            manual,
            selected_subcategory,
            batch_size,
        })
    }

    /// Build the item for the `index`-th (1-based) file of the batch.
    pub async fn reconcile(
        &self,
        ctx: &UploadContext,
        file: &UploadedFile,
        index: usize,
    ) -> CatalogueResult<ImageDraft> {
        let manual = &ctx.manual;
        let tag_number = effective_tag(&file.file_name, &manual.tag_number, ctx.batch_size);

        let imported = if tag_number.is_empty() {
            None
        } else {
            self.metadata.get(&tag_number).await?
        };
        match &imported {
            Some(_) => debug!("{} matched metadata {}", file.file_name, tag_number),
            None => debug!("{} has no imported metadata", file.file_name),
        }
        let imported = imported.as_ref();

        let title = resolve_title(imported, manual, &tag_number, &file.file_name, index, ctx.batch_size);

        let mut subcategory = ctx.selected_subcategory.clone();
        if subcategory.is_none() {
            let named = imported.map(|m| m.sub_category.trim()).unwrap_or_default();
            if !named.is_empty() {
                subcategory = Some(self.subcategories.ensure(&ctx.category_id, named).await?);
            }
        }
        let (subcategory_id, subcategory_name) = subcategory
            .map(|sub| (sub.id, sub.name))
            .unwrap_or_default();

        Ok(ImageDraft {
            tag_number,
            title,
            description: prefer(imported.map(|m| m.description.as_str()), &manual.description),
            price: prefer(imported.map(|m| m.price.as_str()), &manual.price),
            gold_type: prefer(imported.map(|m| m.gold_type.as_str()), &manual.gold_type),
            weight: prefer(imported.map(|m| m.weight.as_str()), &manual.weight),
            gst: prefer(imported.map(|m| m.gst.as_str()), &manual.gst),
            category_id: ctx.category_id.clone(),
            subcategory_id,
            subcategory_name,
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            payload: file.data.clone(),
        })
    }
}

/// A single upload may name its tag by hand; a batch always uses file names.
pub fn effective_tag(file_name: &str, manual_tag: &str, batch_size: usize) -> String {
    let from_file = tag_from_filename(file_name);
    if batch_size == 1 {
        let manual = normalize_tag_number(Some(manual_tag));
        if !manual.is_empty() {
            return manual;
        }
    }
    from_file
}

/// First non-empty of: imported title, manual title (numbered ` {index}`
/// in a multi-file batch), tag number, file name. A batch without a manual
/// title is not given a generated "Item N" name; each file falls back to its
/// own tag instead.
fn resolve_title(
    imported: Option<&MetadataRecord>,
    manual: &ManualFields,
    tag_number: &str,
    file_name: &str,
    index: usize,
    batch_size: usize,
) -> String {
    let manual_title = manual.title.trim();
    let manual_title = if batch_size > 1 && !manual_title.is_empty() {
        format!("{} {}", manual_title, index)
    } else {
        manual_title.to_string()
    };

    [
        imported.map(|m| m.title.trim()).unwrap_or_default(),
        manual_title.as_str(),
        tag_number,
        file_name,
    ]
    .into_iter()
    .find(|candidate| !candidate.is_empty())
    .unwrap_or_default()
    .to_string()
}

fn prefer(imported: Option<&str>, manual: &str) -> String {
    match imported.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => manual.trim().to_string(),
    }
}
