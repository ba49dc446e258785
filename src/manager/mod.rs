//! StreamManager - Stream Lifecycle Registry
//!
//! ## Responsibilities
//!
//! - Map stream ids to configs, workers and state snapshots
//! - Create/start/stop/remove streams with the lifecycle error taxonomy
//!
//! The registry is an explicitly owned object, not process-global state:
//! independent manager instances (one per test, one per deployment) never
//! interfere. No two workers for one stream id ever run concurrently —
//! lifecycle transitions happen under the registry write lock and a
//! second start on a RUNNING stream is a no-op.

use crate::config::StreamConfig;
use crate::detector::DetectionEngine;
use crate::error::{Error, Result};
use crate::frame_source::FrameSourceConnector;
use crate::models::{StreamState, StreamStatus};
use crate::store::EventStore;
use crate::worker::StreamWorker;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// StreamManager instance
pub struct StreamManager {
    streams: RwLock<HashMap<String, StreamWorker>>,
    connector: Arc<dyn FrameSourceConnector>,
    engine: Arc<dyn DetectionEngine>,
    store: Arc<EventStore>,
}

impl StreamManager {
    /// Create a manager sharing one connector, engine and store across
    /// all workers.
    pub fn new(
        connector: Arc<dyn FrameSourceConnector>,
        engine: Arc<dyn DetectionEngine>,
        store: Arc<EventStore>,
    ) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            connector,
            engine,
            store,
        }
    }

    /// Register a stream in PENDING state. The config is validated before
    /// any registry change.
    pub async fn create(&self, config: StreamConfig) -> Result<StreamState> {
        config.validate()?;

        let mut streams = self.streams.write().await;
        if streams.contains_key(&config.stream_id) {
            return Err(Error::DuplicateStream(config.stream_id));
        }

        let stream_id = config.stream_id.clone();
        let worker = StreamWorker::new(
            config,
            self.connector.clone(),
            self.engine.clone(),
            self.store.clone(),
        );
        let snapshot = worker.status().await;
        streams.insert(stream_id.clone(), worker);

        tracing::info!(stream_id = %stream_id, "Stream registered");
        Ok(snapshot)
    }

    /// Start (or restart) a stream
    pub async fn start(&self, stream_id: &str) -> Result<StreamState> {
        let mut streams = self.streams.write().await;
        let worker = streams
            .get_mut(stream_id)
            .ok_or_else(|| Error::NotFound(format!("stream {stream_id}")))?;
        worker.start().await
    }

    /// Stop a stream. Returns once the worker has exited its loop.
    pub async fn stop(&self, stream_id: &str) -> Result<StreamState> {
        let mut streams = self.streams.write().await;
        let worker = streams
            .get_mut(stream_id)
            .ok_or_else(|| Error::NotFound(format!("stream {stream_id}")))?;
        Ok(worker.stop().await)
    }

    /// Stop every registered stream (shutdown path)
    pub async fn stop_all(&self) -> Vec<StreamState> {
        let mut streams = self.streams.write().await;
        let mut snapshots = Vec::with_capacity(streams.len());
        for worker in streams.values_mut() {
            snapshots.push(worker.stop().await);
        }
        tracing::info!(count = snapshots.len(), "All streams stopped");
        snapshots
    }

    /// Remove a stream. Requires STOPPED or ERROR; history in the store
    /// is not cascaded.
    pub async fn remove(&self, stream_id: &str) -> Result<()> {
        let mut streams = self.streams.write().await;
        let worker = streams
            .get(stream_id)
            .ok_or_else(|| Error::NotFound(format!("stream {stream_id}")))?;

        let status = worker.status().await.status;
        if !matches!(status, StreamStatus::Stopped | StreamStatus::Error) {
            return Err(Error::InvalidState(format!(
                "stream {stream_id} is {status}, stop it before removal"
            )));
        }

        streams.remove(stream_id);
        tracing::info!(stream_id = %stream_id, "Stream removed");
        Ok(())
    }

    /// Snapshot of one stream
    pub async fn get(&self, stream_id: &str) -> Result<StreamState> {
        let streams = self.streams.read().await;
        let worker = streams
            .get(stream_id)
            .ok_or_else(|| Error::NotFound(format!("stream {stream_id}")))?;
        Ok(worker.status().await)
    }

    /// Snapshots of all streams
    pub async fn list(&self) -> Vec<StreamState> {
        let streams = self.streams.read().await;
        let mut snapshots = Vec::with_capacity(streams.len());
        for worker in streams.values() {
            snapshots.push(worker.status().await);
        }
        snapshots
    }
}
