//! HTTP handlers for catalogue items.
//! Payloads are streamed from disk to avoid buffering in memory; JSON views
//! inline the small JPEG thumbnail as a data URI.

use crate::{
    errors::AppError,
    handlers::catalogue_handlers::require_category,
    models::image::{ImagePatch, ImageRecord},
    services::{
        catalogue_service::{CatalogueService, ImageFilter, PayloadVariant},
        reconciler::{ManualFields, UploadedFile},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ImageListQuery {
    /// `all`, `uncategorized`, or a sub-category id.
    pub subcategory: Option<String>,
}

/// An item as returned to the gallery.
#[derive(Debug, Serialize)]
pub struct ImageView {
    #[serde(flatten)]
    pub record: ImageRecord,
    pub thumbnail: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: usize,
    pub skipped: usize,
    pub items: Vec<ImageView>,
}

/// `GET /categories/{id}/images?subcategory=`
pub async fn list_images(
    State(service): State<CatalogueService>,
    Path(category_id): Path<String>,
    Query(q): Query<ImageListQuery>,
) -> Result<Json<Vec<ImageView>>, AppError> {
    require_category(&service, &category_id).await?;
    let filter = ImageFilter::parse(q.subcategory.as_deref());
    let records = service.list_images(&category_id, &filter).await?;
    Ok(Json(views(&service, records).await))
}

/// `POST /categories/{id}/images`: multipart batch upload.
///
/// Every `files` part is one image; the remaining text parts are the manual
/// form values shared by the batch.
pub async fn upload_images(
    State(service): State<CatalogueService>,
    Path(category_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut files = Vec::new();
    let mut manual = ManualFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "files" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            files.push(UploadedFile {
                file_name,
                content_type,
                data,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        let slot = match name.as_str() {
            "tagNumber" => &mut manual.tag_number,
            "title" => &mut manual.title,
            "description" => &mut manual.description,
            "price" => &mut manual.price,
            "goldType" => &mut manual.gold_type,
            "weight" => &mut manual.weight,
            "gst" => &mut manual.gst,
            "subcategoryId" => &mut manual.subcategory_id,
            other => {
                debug!("ignoring multipart field `{}`", other);
                continue;
            }
        };
        *slot = value;
    }

    let summary = service.upload_batch(&category_id, files, manual).await?;
    let body = UploadResponse {
        uploaded: summary.uploaded,
        skipped: summary.skipped,
        items: views(&service, summary.items).await,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// `GET /images/{id}`
pub async fn get_image(
    State(service): State<CatalogueService>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageView>, AppError> {
    let record = service
        .get_image(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("image `{}` not found", id)))?;
    Ok(Json(view(&service, record).await))
}

/// `PATCH /images/{id}`
pub async fn update_image(
    State(service): State<CatalogueService>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ImagePatch>,
) -> Result<Json<ImageView>, AppError> {
    let record = service.update_image(id, patch).await?;
    Ok(Json(view(&service, record).await))
}

/// `DELETE /images/{id}`
pub async fn delete_image(
    State(service): State<CatalogueService>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.delete_image(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /images/{id}/raw`: the original upload as a streaming response.
pub async fn get_image_raw(
    State(service): State<CatalogueService>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    stream_payload(&service, id, PayloadVariant::Original).await
}

/// `GET /images/{id}/thumbnail`
pub async fn get_image_thumbnail(
    State(service): State<CatalogueService>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    stream_payload(&service, id, PayloadVariant::Thumbnail).await
}

async fn stream_payload(
    service: &CatalogueService,
    id: Uuid,
    variant: PayloadVariant,
) -> Result<Response, AppError> {
    let (record, file) = service.open_image_payload(id, variant).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    match variant {
        PayloadVariant::Original => {
            set_payload_headers(response.headers_mut(), &record.content_type, record.size_bytes)
        }
        PayloadVariant::Thumbnail => {
            set_payload_headers(response.headers_mut(), "image/jpeg", record.thumbnail_size)
        }
    }
    Ok(response)
}

fn set_payload_headers(headers: &mut HeaderMap, content_type: &str, length: i64) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length.max(0)));
}

async fn view(service: &CatalogueService, record: ImageRecord) -> ImageView {
    let thumbnail = match service.read_thumbnail(record.id).await {
        Ok(bytes) => format!(
            "data:image/jpeg;base64,{}",
            general_purpose::STANDARD.encode(bytes)
        ),
        Err(err) => {
            debug!("no thumbnail for {}: {}", record.id, err);
            String::new()
        }
    };
    ImageView { record, thumbnail }
}

async fn views(service: &CatalogueService, records: Vec<ImageRecord>) -> Vec<ImageView> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        out.push(view(service, record).await);
    }
    out
}
