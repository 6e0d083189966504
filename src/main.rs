mod api;
mod config;
mod errors;
mod storage;
mod system;
mod uploads;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use std::error::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::create_api_router;
use crate::config::Settings;
use crate::storage::{LocalDiskStore, R2Client};
use crate::uploads::UploadService;

#[derive(Clone, Debug)]
pub struct InnerState {
    pub uploads: UploadService,
    pub max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creator_upload=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    tracing::info!(
        endpoint = %settings.storage.endpoint,
        bucket = %settings.storage.bucket,
        region = %settings.storage.credentials.region,
        local_fallback = settings.uploads.fallback.is_some(),
        max_upload_bytes = settings.uploads.max_bytes,
        "Loaded configuration"
    );

    let remote = R2Client::new(settings.storage.clone());
    let fallback = settings.uploads.fallback.clone().map(LocalDiskStore::new);
    if let Some(local) = &fallback {
        tokio::fs::create_dir_all(local.root()).await?;
    }

    let app_state = InnerState {
        uploads: UploadService::new(remote, fallback),
        max_upload_bytes: settings.uploads.max_bytes,
    };

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = create_api_router(app_state)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let listener = tokio::net::TcpListener::bind(settings.server.address()).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
