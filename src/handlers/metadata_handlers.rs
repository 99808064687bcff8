//! HTTP handlers for product metadata: single upserts, lookups, bulk
//! spreadsheet import and CSV export.

use crate::{
    errors::AppError,
    models::metadata::MetadataRecord,
    services::{
        catalogue_service::CatalogueService, importer::ImportSummary,
        metadata_store::metadata_template,
    },
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub category: Option<String>,
}

/// `GET /metadata`: every record, or `?category=` for one collection.
pub async fn list_metadata(
    State(service): State<CatalogueService>,
    Query(q): Query<MetadataQuery>,
) -> Result<Json<Vec<MetadataRecord>>, AppError> {
    let rows = match q.category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => {
            service.metadata.list_by_category(category).await?
        }
        _ => service.metadata.list_all().await?,
    };
    Ok(Json(rows))
}

/// `PUT /metadata`: upsert one record keyed by its tag number.
pub async fn put_metadata(
    State(service): State<CatalogueService>,
    Json(record): Json<MetadataRecord>,
) -> Result<Json<MetadataRecord>, AppError> {
    Ok(Json(service.metadata.upsert(record).await?))
}

/// `GET /metadata/{tag}`
pub async fn get_metadata(
    State(service): State<CatalogueService>,
    Path(tag): Path<String>,
) -> Result<Json<MetadataRecord>, AppError> {
    service
        .metadata
        .get(&tag)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("metadata for `{}` not found", tag)))
}

/// `POST /metadata/import`: multipart upload with the sheet in field `file`.
pub async fn import_metadata(
    State(service): State<CatalogueService>,
    mut multipart: Multipart,
) -> Result<Json<ImportSummary>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;

        let summary = service.importer.import_file(&file_name, data).await?;
        return Ok(Json(summary));
    }

    Err(AppError::bad_request("Please select a file"))
}

/// `GET /metadata/export`
pub async fn export_metadata(
    State(service): State<CatalogueService>,
) -> Result<Response, AppError> {
    let csv = service.metadata.export_csv().await?;
    Ok(csv_attachment(csv, "product-metadata.csv"))
}

/// `GET /metadata/template`
pub async fn download_template() -> Response {
    csv_attachment(metadata_template(), "metadata-template.csv")
}

fn csv_attachment(body: String, file_name: &'static str) -> Response {
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
