use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error as StdError;

use crate::storage::{SigningError, StorageError};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation errors")]
    ValidationErrors(HashMap<String, Vec<String>>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("External service error: {0}")]
    ExternalService(#[source] anyhow::Error),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(#[from] anyhow::Error), // Catch-all for other anyhow errors
}

impl AppError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::ValidationErrors(errors)
    }
}

fn storage_status(err: &StorageError) -> (StatusCode, String) {
    match err {
        StorageError::Rejected { status, .. } => (
            StatusCode::BAD_GATEWAY,
            format!("Object store rejected the request with HTTP {}", status),
        ),
        StorageError::Transport(e) => (
            StatusCode::BAD_GATEWAY,
            format!("Object store unreachable: {}", e),
        ),
        StorageError::InvalidKey(key) => {
            (StatusCode::BAD_REQUEST, format!("Invalid object key: {}", key))
        }
        StorageError::Signing(SigningError::InvalidExpiry(_)) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        StorageError::Signing(_) | StorageError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Upload could not be stored".to_string(),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, errors) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::ValidationErrors(validation_errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(validation_errors.clone()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Storage(e) => {
                let (status, message) = storage_status(e);
                (status, message, None)
            }
            AppError::ExternalService(e) => (
                StatusCode::BAD_GATEWAY,
                format!("External service error: {}", e),
                None,
            ),
            AppError::Unexpected(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An unexpected error occurred: {}", e),
                None,
            ),
        };

        tracing::error!(
            error_type = %self,
            error_message = %error_message,
            status_code = %status,
            "Request error"
        );

        // Log the source chain for anything that ends up as a 5xx
        if status.is_server_error() {
            let mut source_chain = String::new();
            let mut current_err: Option<&(dyn StdError + 'static)> = self.source();
            while let Some(err) = current_err {
                source_chain.push_str(&format!("\n  Caused by: {}", err));
                current_err = err.source();
            }
            if !source_chain.is_empty() {
                tracing::error!("Error source chain:{}", source_chain);
            }
        }

        let body = match errors {
            Some(validation_errors) => Json(json!({
                "success": false,
                "message": error_message,
                "status": status.as_u16(),
                "errors": validation_errors
            })),
            None => Json(json!({
                "success": false,
                "message": error_message,
                "status": status.as_u16()
            })),
        };
        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let mut context_parts = Vec::new();

        if let Some(url) = err.url() {
            context_parts.push(format!("URL: {}", url));
        }

        if let Some(status) = err.status() {
            context_parts.push(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            ));
        }

        let error_type = match &err {
            e if e.is_timeout() => "Request Timeout",
            e if e.is_connect() => "Connection Failed",
            e if e.is_decode() => "Response Decode Failed",
            e if e.is_redirect() => "Redirect Loop or Invalid Redirect",
            e if e.is_request() => "Invalid Request",
            e if e.is_body() => "Request Body Error",
            _ => "Unknown HTTP Error",
        };
        context_parts.push(format!("Type: {}", error_type));

        let context = format!("External HTTP request failed - {}", context_parts.join(", "));

        tracing::error!(
            error = %err,
            url = ?err.url(),
            status = ?err.status(),
            is_timeout = err.is_timeout(),
            is_connect = err.is_connect(),
            "HTTP request failed with detailed context"
        );

        AppError::ExternalService(anyhow::Error::new(err).context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn rejected_upload_is_bad_gateway_with_store_status() {
        let err = AppError::from(StorageError::rejected("PUT", "videos/a.mp4", 403, "denied"));
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], 502);
        assert!(body["message"].as_str().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn field_errors_are_listed() {
        let (status, body) = render(AppError::field("file", "is required")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"]["file"][0], "is required");
    }

    #[tokio::test]
    async fn storage_error_statuses() {
        let (status, _) = render(StorageError::InvalidKey("../x".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = render(StorageError::Signing(SigningError::InvalidExpiry(0)).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let (status, body) = render(StorageError::Io(io).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["message"].as_str().unwrap().contains("read-only"));
    }

    #[tokio::test]
    async fn reqwest_failures_map_to_external_service() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::get(format!("http://{}/", addr)).await.unwrap_err();
        let app_err = AppError::from(err);
        assert!(matches!(app_err, AppError::ExternalService(_)));

        let (status, body) = render(app_err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Connection Failed"));
    }
}
