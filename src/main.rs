//! Streamwatch daemon
//!
//! Wires the pipeline from environment configuration, loads stream
//! definitions, schedules retention cleanup and runs until ctrl-c.

use std::sync::Arc;
use std::time::Duration;
use streamwatch::config::{load_stream_configs, AppConfig};
use streamwatch::detector::HttpDetector;
use streamwatch::frame_source::HttpSnapshotConnector;
use streamwatch::manager::StreamManager;
use streamwatch::store::EventStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting streamwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        detector_url = %config.detector_url,
        data_dir = %config.data_dir.display(),
        retention_days = config.retention_days,
        "Configuration loaded"
    );

    // Initialize components
    let store = Arc::new(EventStore::new(&config.data_dir).await?);
    tracing::info!("EventStore initialized");

    let detector = Arc::new(HttpDetector::new(config.detector_url.clone()));
    if detector.health_check().await {
        tracing::info!(detector_url = %config.detector_url, "Detection engine reachable");
    } else {
        tracing::warn!(
            detector_url = %config.detector_url,
            "Detection engine not reachable at startup, workers will retry"
        );
    }

    let connector = Arc::new(HttpSnapshotConnector::new());
    let manager = Arc::new(StreamManager::new(connector, detector, store.clone()));
    tracing::info!("StreamManager initialized");

    // Register and start streams from the definition file
    if let Some(ref path) = config.streams_file {
        let streams = load_stream_configs(path).await?;
        tracing::info!(file = %path.display(), count = streams.len(), "Stream definitions loaded");

        for stream in streams {
            let stream_id = stream.stream_id.clone();
            match manager.create(stream).await {
                Ok(_) => {
                    if let Err(e) = manager.start(&stream_id).await {
                        tracing::error!(stream_id = %stream_id, error = %e, "Stream start failed");
                    }
                }
                Err(e) => {
                    tracing::error!(stream_id = %stream_id, error = %e, "Stream registration failed");
                }
            }
        }
    } else {
        tracing::info!("STREAMS_FILE not set, starting with an empty registry");
    }

    // Retention cleanup on a schedule; the store only exposes the operation
    {
        let store = store.clone();
        let retention_days = config.retention_days;
        let interval_secs = config.cleanup_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match store.cleanup(retention_days).await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed = removed, "Retention cleanup done");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Retention cleanup failed"),
                }
            }
        });
    }
    tracing::info!(
        interval_secs = config.cleanup_interval_secs,
        "Retention cleanup scheduled"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping streams");
    manager.stop_all().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
