use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_SLUG_LEN: usize = 80;
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Video,
    Thumbnail,
}

impl UploadKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "video" => Some(UploadKind::Video),
            "thumbnail" => Some(UploadKind::Thumbnail),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            UploadKind::Video => "videos",
            UploadKind::Thumbnail => "thumbnails",
        }
    }

    /// Videos take `video/*`, thumbnails take `image/*`.
    pub fn accepts(&self, content_type: &str) -> bool {
        let top_level = content_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match self {
            UploadKind::Video => top_level == "video",
            UploadKind::Thumbnail => top_level == "image",
        }
    }
}

/// Keeps ASCII alphanumerics, `-`, `_` and `.`, maps everything else to `-`,
/// lower-cases and caps the length while keeping the extension.
pub fn slugify(original_name: &str) -> String {
    let file_name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let slug: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }

    match slug.rfind('.') {
        Some(dot) if slug.len() - dot <= 10 => {
            let extension = &slug[dot..];
            format!("{}{}", &slug[..MAX_SLUG_LEN - extension.len()], extension)
        }
        _ => slug[..MAX_SLUG_LEN].to_string(),
    }
}

/// `videos/YYYY/MM/<uuid>-<slug>` or `thumbnails/YYYY/MM/<uuid>-<slug>`.
pub fn object_key(kind: UploadKind, original_name: &str, now: &DateTime<Utc>) -> String {
    object_key_with_id(kind, original_name, now, Uuid::new_v4())
}

fn object_key_with_id(
    kind: UploadKind,
    original_name: &str,
    now: &DateTime<Utc>,
    id: Uuid,
) -> String {
    let slug = slugify(original_name);
    let name = if slug.trim_matches(['-', '.']).is_empty() {
        id.to_string()
    } else {
        format!("{}-{}", id, slug)
    };
    format!("{}/{:04}/{:02}/{}", kind.prefix(), now.year(), now.month(), name)
}

/// Declared multipart type first, then the file extension, then
/// `application/octet-stream`.
pub fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|d| !d.is_empty()) {
        if declared != OCTET_STREAM {
            return declared.to_lowercase();
        }
    }
    mime_guess::from_path(file_name)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// Extension stored for a decoded data-URL image.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
