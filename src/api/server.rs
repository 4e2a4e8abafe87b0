use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    auth::ApiKeyRegistry,
    services::{geosubmit, health},
    state::AppState,
};
use crate::config::{Config, ExportProvider, StorageBackend};
use crate::export::{NoopExporter, ObjectStoreExporter, ReportExporter};
use crate::observability::Metrics;
use crate::storage::{FjallObservationStore, InMemoryObservationStore, ObservationStore};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Run the HTTP service until a shutdown signal arrives
///
/// `address` overrides `server.bind_addr` from the configuration.
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);
    let state = build_state(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "geosubmit API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wire the configured backends into shared handler state
pub fn build_state(config: Config) -> Result<AppState, AnyError> {
    let api_keys = Arc::new(ApiKeyRegistry::from_config(&config));
    info!(keys = api_keys.len(), "Loaded API keys");

    let store: Arc<dyn ObservationStore> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory observation store");
            Arc::new(InMemoryObservationStore::new())
        }
        StorageBackend::Fjall => {
            info!(path = %config.storage.path.display(), "Opening Fjall observation store");
            Arc::new(
                FjallObservationStore::open(&config.storage.path)
                    .map_err(|e| format!("Failed to open observation store: {}", e))?,
            )
        }
    };

    let exporter: Arc<dyn ReportExporter> = if !config.export.enabled {
        Arc::new(NoopExporter)
    } else {
        match config.export.provider {
            ExportProvider::Memory => {
                Arc::new(ObjectStoreExporter::in_memory(&config.export.prefix))
            }
            ExportProvider::Local => {
                info!(
                    root = %config.export.root.display(),
                    "Exporting reports to local filesystem"
                );
                Arc::new(
                    ObjectStoreExporter::local(&config.export.root, &config.export.prefix)
                        .map_err(|e| format!("Failed to initialize exporter: {}", e))?,
                )
            }
        }
    };

    Ok(AppState::new(
        config,
        api_keys,
        store,
        exporter,
        Arc::new(Metrics::new()),
    ))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/geosubmit", post(geosubmit))
        .route("/health", get(health))
        .with_state(state)
        // Transparently decode gzip request bodies (Content-Encoding: gzip)
        .layer(RequestDecompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
