//! API Version 1 endpoints
//!
//! Upload, thumbnail, delete and pre-signed download endpoints.

pub mod thumbnails;
pub mod uploads;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::InnerState;

/// Creates the V1 API router
#[tracing::instrument(name = "create_v1_router", skip(state))]
pub fn create_v1_router(state: InnerState) -> Router<InnerState> {
    tracing::info!("Creating V1 API router");

    Router::new()
        .route("/api/v1/uploads", post(uploads::upload_file))
        .route("/api/v1/uploads/presign", get(uploads::presign_upload))
        .route("/api/v1/uploads/{*key}", delete(uploads::delete_upload))
        .route("/api/v1/thumbnails", post(thumbnails::save_thumbnail))
        .with_state(state)
}
