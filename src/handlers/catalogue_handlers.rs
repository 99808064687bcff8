//! HTTP handlers for collections and their sub-categories.

use crate::{
    errors::AppError,
    models::category::{Category, CategoryInput, CategorySummary, Subcategory, SubcategoryInput},
    services::catalogue_service::CatalogueService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// `GET /categories`
pub async fn list_categories(
    State(service): State<CatalogueService>,
) -> Result<Json<Vec<CategorySummary>>, AppError> {
    Ok(Json(service.list_categories().await?))
}

/// `POST /categories`
pub async fn create_category(
    State(service): State<CatalogueService>,
    Json(input): Json<CategoryInput>,
) -> Result<impl IntoResponse, AppError> {
    let category = service.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// `GET /categories/{id}`
pub async fn get_category(
    State(service): State<CatalogueService>,
    Path(id): Path<String>,
) -> Result<Json<Category>, AppError> {
    require_category(&service, &id).await.map(Json)
}

/// `PUT /categories/{id}`
pub async fn update_category(
    State(service): State<CatalogueService>,
    Path(id): Path<String>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(service.update_category(&id, input).await?))
}

/// `DELETE /categories/{id}`: removes the collection's items and
/// sub-categories as well.
pub async fn delete_category(
    State(service): State<CatalogueService>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete_category(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /categories/{id}/subcategories`
pub async fn list_subcategories(
    State(service): State<CatalogueService>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Subcategory>>, AppError> {
    require_category(&service, &id).await?;
    Ok(Json(service.subcategories.list(&id).await?))
}

/// `POST /categories/{id}/subcategories`
pub async fn create_subcategory(
    State(service): State<CatalogueService>,
    Path(id): Path<String>,
    Json(input): Json<SubcategoryInput>,
) -> Result<impl IntoResponse, AppError> {
    require_category(&service, &id).await?;
    let sub = service.subcategories.save(&id, &input).await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

pub(crate) async fn require_category(
    service: &CatalogueService,
    id: &str,
) -> Result<Category, AppError> {
    service
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("collection `{}` not found", id)))
}
