//! src/services/catalogue_service.rs
//!
//! CatalogueService: collections and catalogue items backed by SQLite for
//! metadata and local disk for image payloads. Payloads are sharded beneath
//! `base_path/images/{shard}/{shard}/{id}` with the thumbnail stored beside the
//! original as `{id}.thumb.jpg`.

use crate::errors::{CatalogueError, CatalogueResult};
use crate::models::{
    category::{Category, CategoryInput, CategorySummary},
    image::{ImageDraft, ImagePatch, ImageRecord},
};
use crate::services::{
    collection::{SqliteMetadataCollection, SqliteSubcategoryCollection},
    importer::MetadataImporter,
    metadata_store::MetadataStore,
    normalize::normalize_tag_number,
    reconciler::{ImageReconciler, ManualFields, UploadedFile},
    subcategory_store::SubcategoryStore,
    tabular::TabularParser,
    thumbnail::Thumbnailer,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const IMAGE_COLUMNS: &str = "id, tag_number, title, description, price, gold_type, weight, gst, \
                             category_id, subcategory_id, subcategory_name, file_name, size_bytes, \
                             content_type, thumbnail_size, created_at";

/// Which payload of an item to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadVariant {
    Original,
    Thumbnail,
}

/// Sub-category filter for item listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    All,
    /// Items without a sub-category.
    Uncategorized,
    Subcategory(String),
}

impl ImageFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Self::All,
            Some("uncategorized") => Self::Uncategorized,
            Some(id) => Self::Subcategory(id.to_string()),
        }
    }
}

/// Outcome of a batch upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub items: Vec<ImageRecord>,
}

/// CatalogueService owns every store the HTTP layer talks to:
/// - collections and catalogue items (SQLite rows + on-disk payloads)
/// - product metadata and its importer
/// - sub-categories and the image reconciler
#[derive(Clone)]
pub struct CatalogueService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where image payloads are stored.
    pub base_path: PathBuf,

    pub metadata: MetadataStore,
    pub importer: MetadataImporter,
    pub subcategories: SubcategoryStore,
    pub reconciler: ImageReconciler,
    thumbnailer: Thumbnailer,
}

impl CatalogueService {
    /// Create a CatalogueService backed by the provided SQLite pool and using
    /// `base_path` as the root directory for image payloads.
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>, parser: TabularParser) -> Self {
        let metadata = MetadataStore::new(Arc::new(SqliteMetadataCollection::new(db.clone())));
        let subcategories =
            SubcategoryStore::new(Arc::new(SqliteSubcategoryCollection::new(db.clone())));
        Self {
            importer: MetadataImporter::new(parser, metadata.clone()),
            reconciler: ImageReconciler::new(metadata.clone(), subcategories.clone()),
            db,
            base_path: base_path.into(),
            metadata,
            subcategories,
            thumbnailer: Thumbnailer::default(),
        }
    }

    /// Generate two-level shard identifiers for an item id.
    ///
    /// Uses MD5(id) and returns the first two bytes as lowercase hexadecimal
    /// strings (00–ff). Reduces file count per directory.
    fn payload_shards(id: Uuid) -> (String, String) {
        let digest = md5::compute(id.to_string());
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn images_root(&self) -> PathBuf {
        self.base_path.join("images")
    }

    /// Construct the on-disk path of an item payload. Parent directories may
    /// not exist yet.
    fn payload_path(&self, id: Uuid, variant: PayloadVariant) -> PathBuf {
        let (shard_a, shard_b) = Self::payload_shards(id);
        let mut path = self.images_root();
        path.push(shard_a);
        path.push(shard_b);
        match variant {
            PayloadVariant::Original => path.push(id.to_string()),
            PayloadVariant::Thumbnail => path.push(format!("{}.thumb.jpg", id)),
        }
        path
    }

    // --- Collections ---

    /// Fetch a collection row, `None` when absent.
    pub async fn get_category(&self, id: &str) -> CatalogueResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, image, timestamp FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(category)
    }

    async fn require_category(&self, id: &str) -> CatalogueResult<Category> {
        self.get_category(id)
            .await?
            .ok_or_else(|| CatalogueError::not_found(format!("collection `{}`", id)))
    }

    /// All collections in creation order, each with its item count.
    pub async fn list_categories(&self) -> CatalogueResult<Vec<CategorySummary>> {
        let mut rows = sqlx::query_as::<_, CategorySummary>(
            "SELECT c.id, c.name, c.description, c.image, c.timestamp,
                    COUNT(i.id) AS item_count
             FROM categories c
             LEFT JOIN images i ON i.category_id = c.id
             GROUP BY c.id",
        )
        .fetch_all(&*self.db)
        .await?;
        rows.sort_by_key(|row| row.category.timestamp);
        Ok(rows)
    }

    /// Create a collection. The id defaults to a slug of the name.
    ///
    /// Returns a validation error when name or description is blank, or when
    /// the id or name is already taken.
    pub async fn create_category(&self, input: CategoryInput) -> CatalogueResult<Category> {
        let (name, description) = validate_category(&input)?;
        let id = input
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| slugify(&name));

        let category = Category {
            id,
            name,
            description,
            image: input.image.unwrap_or_default(),
            timestamp: Utc::now(),
        };

        match sqlx::query(
            "INSERT INTO categories (id, name, description, image, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.timestamp)
        .execute(&*self.db)
        .await
        {
            Ok(_) => {
                info!("created collection {}", category.id);
                Ok(category)
            }
            Err(err) if is_unique_violation(&err) => Err(CatalogueError::validation(format!(
                "collection `{}` already exists",
                category.name
            ))),
            Err(err) => Err(CatalogueError::Sqlx(err)),
        }
    }

    /// Edit name and description; the cover image changes only when given.
    pub async fn update_category(&self, id: &str, input: CategoryInput) -> CatalogueResult<Category> {
        let existing = self.require_category(id).await?;
        let (name, description) = validate_category(&input)?;
        let image = input.image.unwrap_or(existing.image);

        let result = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = ?, description = ?, image = ?
             WHERE id = ?
             RETURNING id, name, description, image, timestamp",
        )
        .bind(&name)
        .bind(&description)
        .bind(&image)
        .bind(id)
        .fetch_one(&*self.db)
        .await;

        match result {
            Ok(category) => Ok(category),
            Err(err) if is_unique_violation(&err) => Err(CatalogueError::validation(format!(
                "collection `{}` already exists",
                name
            ))),
            Err(err) => Err(CatalogueError::Sqlx(err)),
        }
    }

    /// Delete a collection together with its items and sub-categories.
    pub async fn delete_category(&self, id: &str) -> CatalogueResult<()> {
        self.require_category(id).await?;

        let images = self.list_images(id, &ImageFilter::All).await?;
        for image in &images {
            self.delete_image(image.id).await?;
        }
        let subs = self.subcategories.delete_by_category(id).await?;

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        info!(
            "deleted collection {} ({} items, {} sub-categories)",
            id,
            images.len(),
            subs
        );
        Ok(())
    }

    // --- Items ---

    /// Upload a batch of files into a collection.
    ///
    /// Files are handled strictly in order, each one thumbnailed, reconciled
    /// and written before the next starts. Non-image files and images that
    /// cannot be decoded are skipped; the rest of the batch continues.
    pub async fn upload_batch(
        &self,
        category_id: &str,
        files: Vec<UploadedFile>,
        manual: ManualFields,
    ) -> CatalogueResult<UploadSummary> {
        self.require_category(category_id).await?;
        if files.is_empty() {
            return Err(CatalogueError::validation("Please select at least one image"));
        }

        let total = files.len();
        let ctx = self.reconciler.context(category_id, manual, total).await?;
        let mut summary = UploadSummary {
            uploaded: 0,
            skipped: 0,
            items: Vec::with_capacity(total),
        };

        for (i, file) in files.iter().enumerate() {
            if !file.content_type.starts_with("image/") {
                debug!("skipping {} ({})", file.file_name, file.content_type);
                summary.skipped += 1;
                continue;
            }

            // decode before reconciling so a skipped file creates no sub-category
            let thumbnailer = self.thumbnailer;
            let data = file.data.clone();
            let thumbnail = match tokio::task::spawn_blocking(move || thumbnailer.render(&data))
                .await
                .map_err(io::Error::other)?
            {
                Ok(thumbnail) => thumbnail,
                Err(err) => {
                    warn!("skipping {}: {}", file.file_name, err);
                    summary.skipped += 1;
                    continue;
                }
            };

            let draft = self.reconciler.reconcile(&ctx, file, i + 1).await?;
            let record = self.insert_image(draft, thumbnail).await?;
            summary.uploaded += 1;
            debug!(
                "uploaded {}/{}: {} as {}",
                summary.uploaded, total, record.file_name, record.id
            );
            summary.items.push(record);
        }

        info!(
            "upload into {}: {} added, {} skipped",
            category_id, summary.uploaded, summary.skipped
        );
        Ok(summary)
    }

    /// Write both payloads to disk, then insert the row.
    ///
    /// Payload files are removed again when the insert fails.
    async fn insert_image(&self, draft: ImageDraft, thumbnail: Vec<u8>) -> CatalogueResult<ImageRecord> {
        let id = Uuid::new_v4();
        let original_path = self.payload_path(id, PayloadVariant::Original);
        let thumbnail_path = self.payload_path(id, PayloadVariant::Thumbnail);

        write_file_atomic(&original_path, &draft.payload).await?;
        if let Err(err) = write_file_atomic(&thumbnail_path, &thumbnail).await {
            let _ = fs::remove_file(&original_path).await;
            return Err(err.into());
        }

        let insert_result = sqlx::query_as::<_, ImageRecord>(&format!(
            r#"
            INSERT INTO images ({IMAGE_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.tag_number)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.price)
        .bind(&draft.gold_type)
        .bind(&draft.weight)
        .bind(&draft.gst)
        .bind(&draft.category_id)
        .bind(&draft.subcategory_id)
        .bind(&draft.subcategory_name)
        .bind(&draft.file_name)
        .bind(draft.payload.len() as i64)
        .bind(&draft.content_type)
        .bind(thumbnail.len() as i64)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(record) => Ok(record),
            Err(err) => {
                let _ = fs::remove_file(&original_path).await;
                let _ = fs::remove_file(&thumbnail_path).await;
                Err(CatalogueError::Sqlx(err))
            }
        }
    }

    /// Fetch an item row, `None` when absent.
    pub async fn get_image(&self, id: Uuid) -> CatalogueResult<Option<ImageRecord>> {
        let record = sqlx::query_as::<_, ImageRecord>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn require_image(&self, id: Uuid) -> CatalogueResult<ImageRecord> {
        self.get_image(id)
            .await?
            .ok_or_else(|| CatalogueError::not_found(format!("image `{}`", id)))
    }

    /// Items of a collection, newest first.
    pub async fn list_images(
        &self,
        category_id: &str,
        filter: &ImageFilter,
    ) -> CatalogueResult<Vec<ImageRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE category_id = "
        ));
        builder.push_bind(category_id);

        match filter {
            ImageFilter::All => {}
            ImageFilter::Uncategorized => {
                builder.push(" AND subcategory_id = ''");
            }
            ImageFilter::Subcategory(id) => {
                builder.push(" AND subcategory_id = ");
                builder.push_bind(id);
            }
        }

        let mut rows: Vec<ImageRecord> = builder.build_query_as().fetch_all(&*self.db).await?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    /// Open a payload for streaming.
    ///
    /// Returns NotFound if the row exists but the file is missing on disk.
    pub async fn open_image_payload(
        &self,
        id: Uuid,
        variant: PayloadVariant,
    ) -> CatalogueResult<(ImageRecord, File)> {
        let record = self.require_image(id).await?;
        let path = self.payload_path(id, variant);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                CatalogueError::not_found(format!("payload for image `{}`", id))
            } else {
                CatalogueError::Io(err)
            }
        })?;
        Ok((record, file))
    }

    /// Read the thumbnail into memory.
    pub async fn read_thumbnail(&self, id: Uuid) -> CatalogueResult<Vec<u8>> {
        Ok(fs::read(self.payload_path(id, PayloadVariant::Thumbnail)).await?)
    }

    /// Apply an admin edit. Changing the sub-category re-resolves its name;
    /// an empty sub-category id clears it.
    pub async fn update_image(&self, id: Uuid, patch: ImagePatch) -> CatalogueResult<ImageRecord> {
        let mut record = self.require_image(id).await?;

        let text = |value: Option<String>, current: &mut String| {
            if let Some(value) = value {
                *current = value.trim().to_string();
            }
        };
        if let Some(tag) = patch.tag_number {
            record.tag_number = normalize_tag_number(Some(&tag));
        }
        text(patch.title, &mut record.title);
        text(patch.description, &mut record.description);
        text(patch.price, &mut record.price);
        text(patch.gold_type, &mut record.gold_type);
        text(patch.weight, &mut record.weight);
        text(patch.gst, &mut record.gst);

        if let Some(sub_id) = patch.subcategory_id.as_deref().map(str::trim) {
            if sub_id.is_empty() {
                record.subcategory_id.clear();
                record.subcategory_name.clear();
            } else {
                let sub = self
                    .subcategories
                    .get(sub_id)
                    .await?
                    .filter(|sub| sub.category_id == record.category_id)
                    .ok_or_else(|| {
                        CatalogueError::validation(format!(
                            "sub-category `{}` does not belong to collection `{}`",
                            sub_id, record.category_id
                        ))
                    })?;
                record.subcategory_id = sub.id;
                record.subcategory_name = sub.name;
            }
        }

        let updated = sqlx::query_as::<_, ImageRecord>(&format!(
            r#"
            UPDATE images SET
                tag_number = ?, title = ?, description = ?, price = ?, gold_type = ?,
                weight = ?, gst = ?, subcategory_id = ?, subcategory_name = ?
            WHERE id = ?
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(&record.tag_number)
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.price)
        .bind(&record.gold_type)
        .bind(&record.weight)
        .bind(&record.gst)
        .bind(&record.subcategory_id)
        .bind(&record.subcategory_name)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| CatalogueError::not_found(format!("image `{}`", id)))?;

        Ok(updated)
    }

    /// Delete an item row and its payloads.
    ///
    /// Files are removed best-effort and empty shard directories pruned.
    pub async fn delete_image(&self, id: Uuid) -> CatalogueResult<ImageRecord> {
        let record = self.require_image(id).await?;

        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogueError::not_found(format!("image `{}`", id)));
        }

        for variant in [PayloadVariant::Original, PayloadVariant::Thumbnail] {
            let path = self.payload_path(id, variant);
            match fs::remove_file(&path).await {
                Ok(_) => debug!("removed payload {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("payload {} already missing", path.display());
                }
                Err(err) => return Err(CatalogueError::Io(err)),
            }
        }

        if let Some(parent) = self.payload_path(id, PayloadVariant::Original).parent() {
            self.prune_empty_dirs(parent, &self.images_root()).await;
        }

        Ok(record)
    }

    /// Recursively remove empty directories up to the storage root.
    ///
    /// Stops when:
    /// - directory not empty
    /// - directory not found
    /// - reached root
    /// - encountered unexpected I/O errors
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Write `data` to a temporary sibling, fsync, then rename into place.
async fn write_file_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| io::Error::other("payload path missing parent directory"))?;
    fs::create_dir_all(&parent).await?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

    let written = async {
        let mut file = File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if written.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    written
}

fn validate_category(input: &CategoryInput) -> CatalogueResult<(String, String)> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(CatalogueError::validation("Please enter a collection name"));
    }
    let description = input.description.trim();
    if description.is_empty() {
        return Err(CatalogueError::validation("Please enter a description"));
    }
    Ok((name.to_string(), description.to_string()))
}

/// `"Gold Rings"` -> `"gold-rings"`. Falls back to a UUID when nothing is left.
fn slugify(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        slug
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
