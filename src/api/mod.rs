//! API module containing all versioned API endpoints
//!
//! This module organizes API endpoints by version and wires the shared
//! layers (body limit, CORS, request tracing) around them.

pub mod common;
pub mod v1;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::common::tracing::{
    make_custom_span, on_custom_failure, on_custom_request, on_custom_response,
};
use crate::system::create_system_router;
use crate::InnerState;

/// Creates the main API router with all versions
#[tracing::instrument(name = "create_api_router", skip(state))]
pub fn create_api_router(state: InnerState) -> Router {
    tracing::info!("Creating API router with versioned endpoints");

    let mut router = Router::new()
        .merge(create_system_router(state.clone()))
        .merge(v1::create_v1_router(state.clone()));

    if let Some(local) = state.uploads.fallback() {
        tracing::info!(
            dir = %local.root().display(),
            prefix = %local.public_prefix(),
            "Serving local fallback uploads"
        );
        router = router.nest_service(local.public_prefix(), ServeDir::new(local.root()));
    }

    router
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_custom_span::<Body>)
                .on_request(on_custom_request::<Body>)
                .on_response(on_custom_response::<Body>)
                .on_failure(on_custom_failure),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::common::ApiResponse;
    use crate::api::v1::uploads::{PresignResponse, UploadResponse};
    use crate::config::LocalFallbackConfig;
    use crate::storage::r2::tests::{client_for, spawn_mock_store, ReceivedRequest};
    use crate::storage::{LocalDiskStore, StorageLocation};
    use crate::uploads::UploadService;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-CREATOR-UPLOAD-BOUNDARY";

    struct TestApp {
        router: Router,
        received: Arc<Mutex<Vec<ReceivedRequest>>>,
        _dir: Option<tempfile::TempDir>,
    }

    async fn test_app(store_status: StatusCode, with_fallback: bool) -> TestApp {
        let (endpoint, received) = spawn_mock_store(store_status).await;
        let dir = with_fallback.then(|| tempfile::tempdir().unwrap());
        let fallback = dir.as_ref().map(|dir| {
            LocalDiskStore::new(LocalFallbackConfig {
                dir: dir.path().to_path_buf(),
                public_prefix: "/uploads".to_string(),
            })
        });

        let state = InnerState {
            uploads: UploadService::new(client_for(&endpoint, None), fallback),
            max_upload_bytes: 1024 * 1024,
        };

        TestApp {
            router: create_api_router(state),
            received,
            _dir: dir,
        }
    }

    struct Part<'a> {
        name: &'a str,
        file_name: Option<&'a str>,
        content_type: Option<&'a str>,
        data: &'a [u8],
    }

    fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let disposition = match part.file_name {
                Some(file_name) => format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, file_name
                ),
                None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
            };
            body.extend_from_slice(disposition.as_bytes());
            if let Some(content_type) = part.content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/uploads")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn video_part(data: &[u8]) -> Part<'_> {
        Part {
            name: "file",
            file_name: Some("My Clip.mp4"),
            content_type: Some("video/mp4"),
            data,
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_app(StatusCode::OK, false).await;
        let response = app
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn video_upload_reaches_the_store() {
        let app = test_app(StatusCode::OK, false).await;
        let data = b"\x00\x00\x00\x18ftypmp42 video";

        let response = app
            .router
            .oneshot(multipart_request(&[video_part(data)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: ApiResponse<UploadResponse> =
            serde_json::from_value(json_body(response).await).unwrap();
        assert!(body.success);
        let upload = body.data.unwrap();
        assert!(upload.key.starts_with("videos/"));
        assert!(upload.key.ends_with("-my-clip.mp4"));
        assert_eq!(upload.storage, StorageLocation::Remote);
        assert_eq!(upload.size, data.len());
        assert_eq!(upload.content_type, "video/mp4");

        let requests = app.received.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "PUT");
        assert_eq!(requests[0].body, data.to_vec());
        assert_eq!(requests[0].path, format!("/media/{}", upload.key));
    }

    #[tokio::test]
    async fn thumbnail_kind_is_honoured() {
        let app = test_app(StatusCode::OK, false).await;
        let request = multipart_request(&[
            Part {
                name: "kind",
                file_name: None,
                content_type: None,
                data: b"thumbnail",
            },
            Part {
                name: "file",
                file_name: Some("cover.png"),
                content_type: None,
                data: b"\x89PNG\r\n\x1a\n",
            },
        ]);

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["data"]["key"].as_str().unwrap().starts_with("thumbnails/"));
        assert_eq!(body["data"]["content_type"], "image/png");
    }

    #[tokio::test]
    async fn upload_validation_failures_are_400() {
        let cases = vec![
            (
                vec![Part {
                    name: "kind",
                    file_name: None,
                    content_type: None,
                    data: b"video",
                }],
                "file",
            ),
            (vec![video_part(b"")], "file"),
            (
                vec![Part {
                    name: "file",
                    file_name: Some("notes.txt"),
                    content_type: Some("text/plain"),
                    data: b"hello",
                }],
                "file",
            ),
            (
                vec![
                    Part {
                        name: "kind",
                        file_name: None,
                        content_type: None,
                        data: b"audio",
                    },
                    video_part(b"x"),
                ],
                "kind",
            ),
        ];

        for (parts, field) in cases {
            let app = test_app(StatusCode::OK, false).await;
            let response = app.router.oneshot(multipart_request(&parts)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json_body(response).await;
            assert_eq!(body["success"], false);
            assert!(body["errors"][field].is_array(), "no error for {field}: {body}");
            assert!(app.received.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn store_rejection_without_fallback_is_502() {
        let app = test_app(StatusCode::FORBIDDEN, false).await;
        let response = app
            .router
            .oneshot(multipart_request(&[video_part(b"data")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn store_rejection_with_fallback_serves_local_copy() {
        let app = test_app(StatusCode::FORBIDDEN, true).await;
        let response = app
            .router
            .clone()
            .oneshot(multipart_request(&[video_part(b"local bytes")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["data"]["storage"], "local");
        let url = body["data"]["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/uploads/videos/"));

        let response = app
            .router
            .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let served = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&served[..], b"local bytes");
    }

    #[tokio::test]
    async fn thumbnail_data_url_is_stored_under_video_id() {
        let app = test_app(StatusCode::OK, false).await;
        let request = Request::post("/api/v1/thumbnails")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "video_id": "vid_123",
                    "thumbnail_data": "data:image/png;base64,iVBORw0KGgo="
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["key"], "thumbnails/vid_123.png");

        let requests = app.received.lock().unwrap();
        assert_eq!(requests[0].path, "/media/thumbnails/vid_123.png");
        assert_eq!(requests[0].body, b"\x89PNG\r\n\x1a\n".to_vec());
        assert_eq!(requests[0].headers["content-type"], "image/png");
    }

    #[tokio::test]
    async fn malformed_thumbnail_requests_are_400() {
        for payload in [
            json!({ "video_id": "vid", "thumbnail_data": "not a data url" }),
            json!({ "video_id": "../etc", "thumbnail_data": "data:image/png;base64,iVBORw0KGgo=" }),
            json!({ "video_id": "vid" }),
        ] {
            let app = test_app(StatusCode::OK, false).await;
            let request = Request::post("/api/v1/thumbnails")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap();
            let response = app.router.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {payload}");
        }
    }

    #[tokio::test]
    async fn delete_removes_nested_key() {
        let app = test_app(StatusCode::NO_CONTENT, false).await;
        let response = app
            .router
            .oneshot(
                Request::delete("/api/v1/uploads/videos/2024/05/a.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["key"], "videos/2024/05/a.mp4");

        let requests = app.received.lock().unwrap();
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].path, "/media/videos/2024/05/a.mp4");
    }

    #[tokio::test]
    async fn presign_defaults_and_bounds_expiry() {
        let app = test_app(StatusCode::OK, false).await;
        let response = app
            .router
            .clone()
            .oneshot(
                Request::get("/api/v1/uploads/presign?key=videos/a.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: ApiResponse<PresignResponse> =
            serde_json::from_value(json_body(response).await).unwrap();
        let presigned = body.data.unwrap();
        assert_eq!(presigned.expires_in, 3600);
        assert!(presigned.url.contains("/media/videos/a.mp4?"));
        assert!(presigned.url.contains("X-Amz-Expires=3600"));

        for uri in [
            "/api/v1/uploads/presign?key=videos/a.mp4&expires=0",
            "/api/v1/uploads/presign?key=videos/a.mp4&expires=604801",
            "/api/v1/uploads/presign?key=",
            "/api/v1/uploads/presign",
        ] {
            let response = app
                .router
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}
