use axum::http::StatusCode;
use axum::response::IntoResponse;

#[tracing::instrument(name = "Health check")]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
