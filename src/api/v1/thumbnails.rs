use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::api::common::ApiResponse;
use crate::api::v1::uploads::UploadResponse;
use crate::errors::AppError;
use crate::storage::Payload;
use crate::uploads::keys::image_extension;
use crate::InnerState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ThumbnailRequest {
    pub video_id: String,
    pub thumbnail_data: String,
}

/// Decoded `data:image/<type>;base64,<...>` URL.
#[derive(Debug, PartialEq, Eq)]
pub struct DataUrlImage {
    pub content_type: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

pub fn parse_data_url(data_url: &str) -> Result<DataUrlImage, AppError> {
    let invalid = |reason: &str| AppError::field("thumbnail_data", reason.to_string());

    let rest = data_url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| invalid("must be a data URL"))?;
    let (meta, encoded) = rest
        .split_once(',')
        .ok_or_else(|| invalid("is missing the data section"))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("must be base64 encoded"))?
        .to_lowercase();
    let extension =
        image_extension(&content_type).ok_or_else(|| invalid("unsupported image type"))?;

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| invalid("is not valid base64"))?;
    if bytes.is_empty() {
        return Err(invalid("is empty"));
    }

    Ok(DataUrlImage {
        content_type,
        extension,
        bytes,
    })
}

fn valid_video_id(video_id: &str) -> bool {
    !video_id.is_empty()
        && video_id.len() <= 64
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[tracing::instrument(name = "Save thumbnail", skip(inner, payload))]
pub async fn save_thumbnail(
    State(inner): State<InnerState>,
    payload: Result<Json<ThumbnailRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UploadResponse>>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let video_id = request.video_id.trim();
    if !valid_video_id(video_id) {
        return Err(AppError::field(
            "video_id",
            "must be 1-64 characters of letters, digits, '-' or '_'",
        ));
    }

    let image = parse_data_url(&request.thumbnail_data)?;
    let key = format!("thumbnails/{}.{}", video_id, image.extension);
    let payload = Payload::from_bytes(Bytes::from(image.bytes));

    tracing::info!(
        video_id = %video_id,
        key = %key,
        size = payload.len(),
        "Storing thumbnail"
    );

    let stored = inner
        .uploads
        .store(&key, &payload, &image.content_type)
        .await?;

    Ok(Json(ApiResponse::success(UploadResponse::from(stored))))
}
