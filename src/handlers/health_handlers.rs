//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the catalogue database and the
//!   payload directory

use crate::services::catalogue_service::CatalogueService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness probe. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Counts collections in SQLite, proving the schema is in place.
/// 2. Performs a write/read/delete round against the storage directory.
///
/// HTTP 200 when every check passes, HTTP 503 otherwise.
pub async fn readyz(State(service): State<CatalogueService>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("sqlite", probe_sqlite(&service).await);
    checks.insert("disk", probe_disk(&service.base_path).await);

    let ready = checks.values().all(|check| check.ok);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if ready { "ok" } else { "error" },
            checks,
        }),
    )
}

async fn probe_sqlite(service: &CatalogueService) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
        .fetch_one(&*service.db)
        .await
    {
        Ok(count) => CheckStatus {
            ok: true,
            error: None,
            detail: Some(format!("{} collections", count)),
        },
        Err(e) => CheckStatus::failed(format!("error: {}", e)),
    }
}

async fn probe_disk(base_path: &Path) -> CheckStatus {
    let tmp_path = base_path.join(format!(".readyz-{}", Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp_path, b"readyz").await {
        return CheckStatus::failed(format!("could not write tmp file: {}", e));
    }

    let read_back = fs::read(&tmp_path).await;
    let removed = fs::remove_file(&tmp_path).await;

    match read_back {
        Ok(bytes) if bytes == b"readyz" => CheckStatus {
            ok: true,
            // a leftover probe file is not fatal
            error: removed
                .err()
                .map(|e| format!("could not remove tmp file: {}", e)),
            detail: None,
        },
        Ok(_) => CheckStatus::failed("file content mismatch".into()),
        Err(e) => CheckStatus::failed(format!("could not read tmp file: {}", e)),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl CheckStatus {
    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
            detail: None,
        }
    }
}
