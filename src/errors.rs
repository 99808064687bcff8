use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Domain errors raised by the catalogue services.
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("unsupported file type `{0}`; use .xlsx, .xls, or .csv")]
    UnsupportedFormat(String),
    #[error("{0}")]
    CapabilityUnavailable(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("could not decode spreadsheet: {0}")]
    Decode(String),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CatalogueResult<T> = Result<T, CatalogueError>;

impl CatalogueError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<CatalogueError> for AppError {
    fn from(err: CatalogueError) -> Self {
        let status = match &err {
            CatalogueError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            CatalogueError::CapabilityUnavailable(_) => StatusCode::NOT_IMPLEMENTED,
            CatalogueError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogueError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogueError::Decode(_) | CatalogueError::Image(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CatalogueError::Sqlx(_) | CatalogueError::Io(_) => {
                tracing::error!("request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_status() {
        let cases = [
            (
                CatalogueError::UnsupportedFormat("pdf".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                CatalogueError::CapabilityUnavailable("no decoder".into()),
                StatusCode::NOT_IMPLEMENTED,
            ),
            (
                CatalogueError::validation("tagNumber is required"),
                StatusCode::BAD_REQUEST,
            ),
            (CatalogueError::not_found("image"), StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status, expected);
        }
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let err = AppError::from(CatalogueError::not_found("image `42`"));
        assert_eq!(err.message, "image `42` not found");
    }
}
