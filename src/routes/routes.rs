//! Defines routes for the jewellery catalogue API.
//!
//! ## Structure
//! - **Metadata endpoints**
//!   - `GET    /metadata`: list records (optional `?category=`)
//!   - `PUT    /metadata`: upsert one record
//!   - `GET    /metadata/{tag}`: record by tag number
//!   - `POST   /metadata/import`: bulk import from xlsx/xls/csv
//!   - `GET    /metadata/export`, `GET /metadata/template`: CSV downloads
//!
//! - **Collection endpoints**
//!   - `GET|POST /categories`, `GET|PUT|DELETE /categories/{id}`
//!   - `GET|POST /categories/{id}/subcategories`
//!   - `GET|POST /categories/{id}/images`: gallery listing and batch upload
//!
//! - **Item endpoints**
//!   - `GET|PATCH|DELETE /images/{id}`
//!   - `GET /images/{id}/raw`, `GET /images/{id}/thumbnail`: payload streams

use crate::{
    handlers::{
        catalogue_handlers::{
            create_category, create_subcategory, delete_category, get_category, list_categories,
            list_subcategories, update_category,
        },
        health_handlers::{healthz, readyz},
        image_handlers::{
            delete_image, get_image, get_image_raw, get_image_thumbnail, list_images,
            update_image, upload_images,
        },
        metadata_handlers::{
            download_template, export_metadata, get_metadata, import_metadata, list_metadata,
            put_metadata,
        },
    },
    services::catalogue_service::CatalogueService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router for every catalogue route.
///
/// `max_body_bytes` caps request bodies, which bounds spreadsheet imports
/// and image batches alike. The router carries `CatalogueService` as shared
/// state to all handlers.
pub fn routes(max_body_bytes: usize) -> Router<CatalogueService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // metadata; fixed segments are matched before `{tag}`
        .route("/metadata", get(list_metadata).put(put_metadata))
        .route("/metadata/import", post(import_metadata))
        .route("/metadata/export", get(export_metadata))
        .route("/metadata/template", get(download_template))
        .route("/metadata/{tag}", get(get_metadata))
        // collections
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .route(
            "/categories/{id}/subcategories",
            get(list_subcategories).post(create_subcategory),
        )
        .route(
            "/categories/{id}/images",
            get(list_images).post(upload_images),
        )
        // items
        .route(
            "/images/{id}",
            get(get_image).patch(update_image).delete(delete_image),
        )
        .route("/images/{id}/raw", get(get_image_raw))
        .route("/images/{id}/thumbnail", get(get_image_thumbnail))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, services::tabular::TabularParser};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use serde_json::{Value, json};
    use std::io::Cursor;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    const BOUNDARY: &str = "catalogue-test-boundary";

    async fn app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service = CatalogueService::new(test_pool().await, dir.path(), TabularParser::default());
        (routes(8 * 1024 * 1024).with_state(service), dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str, Vec<u8>),
    }

    fn multipart(uri: &str, parts: Vec<Part<'_>>) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, content_type, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, file_name, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, image::Rgb([10, 20, 30])))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn health_endpoints_respond() {
        let (app, _dir) = app().await;
        let (status, body) = send_json(&app, get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send_json(&app, get("/readyz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["disk"]["ok"], true);
    }

    #[tokio::test]
    async fn metadata_upsert_and_lookup() {
        let (app, _dir) = app().await;

        let (status, body) = send_json(
            &app,
            json_request("PUT", "/metadata", json!({"tagNumber": " abj-1 ", "title": "Ring"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tagNumber"], "ABJ-1");

        let (status, body) = send_json(&app, get("/metadata/abj-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Ring");

        let (status, _) = send_json(&app, get("/metadata/ABJ-404")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metadata_without_tag_is_bad_request() {
        let (app, _dir) = app().await;
        let (status, body) =
            send_json(&app, json_request("PUT", "/metadata", json!({"title": "Orphan"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "tagNumber is required");
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn csv_import_then_export() {
        let (app, _dir) = app().await;
        let csv = b"Tag,Title,Category\nabj-1,Ring,gold-rings\n,Bad,\n".to_vec();
        let (status, body) = send_json(
            &app,
            multipart(
                "/metadata/import",
                vec![Part::File("file", "sheet.csv", "text/csv", csv)],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"imported": 1, "skipped": 1}));

        let (status, body) = send_json(&app, get("/metadata?category=gold-rings")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let response = app.clone().oneshot(get("/metadata/export")).await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let text = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(text.to_vec()).unwrap();
        assert!(text.starts_with("tagNumber,title,"));
        assert!(text.contains("\"ABJ-1\",\"Ring\""));
    }

    #[tokio::test]
    async fn import_rejects_unknown_extension() {
        let (app, _dir) = app().await;
        let (status, body) = send_json(
            &app,
            multipart(
                "/metadata/import",
                vec![Part::File("file", "sheet.pdf", "application/pdf", b"%PDF".to_vec())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].as_str().unwrap().contains("pdf"));
    }

    #[tokio::test]
    async fn spreadsheet_import_without_decoder_is_not_implemented() {
        let (app, _dir) = app().await;
        let (status, _) = send_json(
            &app,
            multipart(
                "/metadata/import",
                vec![Part::File(
                    "file",
                    "sheet.xlsx",
                    "application/octet-stream",
                    b"PK".to_vec(),
                )],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn template_is_downloadable_csv() {
        let (app, _dir) = app().await;
        let (status, body) = send(&app, get("/metadata/template")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("ABJ-1001"));
    }

    #[tokio::test]
    async fn collection_lifecycle() {
        let (app, _dir) = app().await;

        let (status, body) = send_json(&app, get("/categories")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(5));
        assert_eq!(body[0]["itemCount"], 0);

        let (status, body) = send_json(
            &app,
            json_request(
                "POST",
                "/categories",
                json!({"name": "Temple Sets", "description": "Heavy work"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "temple-sets");

        let (status, body) = send_json(
            &app,
            json_request(
                "POST",
                "/categories/temple-sets/subcategories",
                json!({"name": "Bridal"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "temple-sets::bridal");

        let request = Request::builder()
            .method("DELETE")
            .uri("/categories/temple-sets")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send_json(&app, get("/categories/temple-sets")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_list_and_stream_items() {
        let (app, _dir) = app().await;
        let (status, body) = send_json(
            &app,
            multipart(
                "/categories/gold-rings/images",
                vec![
                    Part::Text("title", "Daily ring"),
                    Part::File("files", "abj-77.png", "image/png", png()),
                    Part::File("files", "readme.txt", "text/plain", b"hi".to_vec()),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["uploaded"], 1);
        assert_eq!(body["skipped"], 1);
        let item = &body["items"][0];
        assert_eq!(item["tagNumber"], "ABJ-77");
        assert_eq!(item["title"], "Daily ring 1");
        assert!(
            item["thumbnail"]
                .as_str()
                .unwrap()
                .starts_with("data:image/jpeg;base64,")
        );
        let id = item["id"].as_str().unwrap().to_string();

        let (status, body) = send_json(
            &app,
            get("/categories/gold-rings/images?subcategory=uncategorized"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let response = app
            .clone()
            .oneshot(get(&format!("/images/{}/thumbnail", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

        let (status, raw) = send(&app, get(&format!("/images/{}/raw", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(raw, png());

        let (status, body) = send_json(
            &app,
            json_request("PATCH", &format!("/images/{}", id), json!({"price": "9900"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], "9900");
    }

    #[tokio::test]
    async fn unknown_image_is_not_found() {
        let (app, _dir) = app().await;
        let (status, _) = send_json(&app, get(&format!("/images/{}", uuid::Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_into_missing_collection_is_not_found() {
        let (app, _dir) = app().await;
        let (status, _) = send_json(
            &app,
            multipart(
                "/categories/nowhere/images",
                vec![Part::File("files", "a.png", "image/png", png())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
