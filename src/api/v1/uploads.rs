use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart, TypedMultipartError};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::common::ApiResponse;
use crate::errors::AppError;
use crate::storage::{Payload, StorageLocation, StoredObject};
use crate::uploads::keys::{object_key, resolve_content_type};
use crate::uploads::UploadKind;
use crate::InnerState;

const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

#[derive(TryFromMultipart)]
pub struct UploadForm {
    #[form_data(limit = "unlimited")]
    pub file: Option<FieldData<Bytes>>,
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
    pub storage: StorageLocation,
    pub size: usize,
    pub content_type: String,
    pub sha256: String,
}

impl From<StoredObject> for UploadResponse {
    fn from(stored: StoredObject) -> Self {
        Self {
            key: stored.key,
            url: stored.url,
            storage: stored.location,
            size: stored.size,
            content_type: stored.content_type,
            sha256: stored.sha256,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PresignParams {
    pub key: String,
    pub expires: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresignResponse {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub key: String,
}

#[tracing::instrument(name = "Upload file", skip(inner, form))]
pub async fn upload_file(
    State(inner): State<InnerState>,
    form: Result<TypedMultipart<UploadForm>, TypedMultipartError>,
) -> Result<Json<ApiResponse<UploadResponse>>, AppError> {
    let TypedMultipart(form) = form.map_err(|e| {
        tracing::warn!(error = %e, "Malformed upload form");
        AppError::Validation(format!("Invalid upload form: {}", e))
    })?;

    let kind = match form.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(kind) => UploadKind::parse(kind)
            .ok_or_else(|| AppError::field("kind", format!("unsupported upload kind `{}`", kind)))?,
        None => UploadKind::Video,
    };

    let file = form.file.ok_or_else(|| AppError::field("file", "is required"))?;
    if file.contents.is_empty() {
        return Err(AppError::field("file", "is empty"));
    }

    let file_name = file.metadata.file_name.clone().unwrap_or_default();
    let content_type = resolve_content_type(file.metadata.content_type.as_deref(), &file_name);
    if !kind.accepts(&content_type) {
        return Err(AppError::field(
            "file",
            format!("content type `{}` is not allowed for {:?} uploads", content_type, kind),
        ));
    }

    let key = object_key(kind, &file_name, &Utc::now());
    let payload = Payload::from_bytes(file.contents);

    tracing::info!(
        key = %key,
        size = payload.len(),
        content_type = %content_type,
        "Storing upload"
    );

    let stored = inner.uploads.store(&key, &payload, &content_type).await?;

    Ok(Json(ApiResponse::success(UploadResponse::from(stored))))
}

#[tracing::instrument(name = "Delete upload", skip(inner))]
pub async fn delete_upload(
    State(inner): State<InnerState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<DeleteResponse>>, AppError> {
    let key = key.trim_start_matches('/').to_string();
    if key.is_empty() {
        return Err(AppError::field("key", "is required"));
    }

    inner.uploads.remove(&key).await?;

    tracing::info!(key = %key, "Upload deleted");
    Ok(Json(
        ApiResponse::success(DeleteResponse { key }).with_message("Upload deleted"),
    ))
}

#[tracing::instrument(name = "Presign upload", skip(inner, params))]
pub async fn presign_upload(
    State(inner): State<InnerState>,
    params: Result<Query<PresignParams>, QueryRejection>,
) -> Result<Json<ApiResponse<PresignResponse>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;

    let key = params.key.trim().trim_start_matches('/');
    if key.is_empty() {
        return Err(AppError::field("key", "is required"));
    }
    let expires_in = params.expires.unwrap_or(DEFAULT_PRESIGN_EXPIRY_SECS);

    let url = inner.uploads.presigned_get(key, expires_in)?;

    Ok(Json(ApiResponse::success(PresignResponse { url, expires_in })))
}
