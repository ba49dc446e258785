//! Configuration
//!
//! ## Responsibilities
//!
//! - Process-level configuration from environment variables
//! - Per-stream configuration with up-front validation
//!
//! Stream configs are immutable once a worker starts; changing one requires
//! stop + restart.

use crate::error::{Error, Result};
use crate::models::CaseType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Detection engine base URL
    pub detector_url: String,
    /// Root directory for event/alert partitions
    pub data_dir: PathBuf,
    /// JSON file with stream definitions loaded at startup
    pub streams_file: Option<PathBuf>,
    /// Partition retention window in days
    pub retention_days: u32,
    /// Seconds between retention cleanup runs
    pub cleanup_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            detector_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            streams_file: std::env::var("STREAMS_FILE").map(PathBuf::from).ok(),
            retention_days: std::env::var("DATA_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            cleanup_interval_secs: std::env::var("CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}

/// Detection and tracking parameters for one stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Minimum confidence for a detection to enter the tracker, in [0, 1]
    pub min_confidence: f32,
    /// Class ids to track (COCO ids; 0 = person)
    pub classes: BTreeSet<u32>,
    /// Process every (frame_skip + 1)-th frame; 0 processes all
    pub frame_skip: u32,
    /// Maximum centroid distance (pixels) to match a detection to a track
    pub max_track_distance: f64,
    /// Frames a track survives without a detection before deregistration
    pub max_disappeared_frames: u32,
    /// Bounded wait for one inference call, seconds
    pub infer_timeout_secs: u64,
    /// Live-track count that raises a crowding alert; None disables the rule
    pub crowd_alert_threshold: Option<u32>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            classes: BTreeSet::from([0]),
            frame_skip: 0,
            max_track_distance: 50.0,
            max_disappeared_frames: 30,
            infer_timeout_secs: 30,
            crowd_alert_threshold: None,
        }
    }
}

/// Capture-side parameters for one stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceParams {
    /// Bounded wait when opening the source, seconds
    pub connect_timeout_secs: u64,
    /// Bounded wait for one frame, seconds
    pub read_timeout_secs: u64,
    /// Reconnect attempts before the worker gives up and stays in ERROR
    pub reconnect_attempts: u32,
    /// First reconnect delay; doubles per attempt
    pub reconnect_base_delay_ms: u64,
    /// Backoff cap
    pub reconnect_max_delay_ms: u64,
    /// Pacing between loop iterations
    pub poll_interval_ms: u64,
}

impl Default for SourceParams {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
            reconnect_attempts: 3,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
            poll_interval_ms: 100,
        }
    }
}

/// Configuration for one stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Unique stream identifier
    pub stream_id: String,
    /// Capture source URL
    pub source_url: String,
    /// Deployment scenario
    pub case_type: CaseType,
    /// Per-stream output directory (annotated frames, debug dumps)
    pub output_dir: PathBuf,
    #[serde(default)]
    pub detection: DetectionParams,
    #[serde(default)]
    pub source: SourceParams,
}

impl StreamConfig {
    /// Validate the config. Rejected configs never reach the registry.
    pub fn validate(&self) -> Result<()> {
        if self.stream_id.trim().is_empty() {
            return Err(Error::Validation("stream_id must not be empty".into()));
        }
        if self.source_url.trim().is_empty() {
            return Err(Error::Validation(format!(
                "stream {}: source_url must not be empty",
                self.stream_id
            )));
        }

        let d = &self.detection;
        if !d.min_confidence.is_finite() || !(0.0..=1.0).contains(&d.min_confidence) {
            return Err(Error::Validation(format!(
                "stream {}: min_confidence must be in [0, 1], got {}",
                self.stream_id, d.min_confidence
            )));
        }
        if d.classes.is_empty() {
            return Err(Error::Validation(format!(
                "stream {}: classes must not be empty",
                self.stream_id
            )));
        }
        if !d.max_track_distance.is_finite() || d.max_track_distance <= 0.0 {
            return Err(Error::Validation(format!(
                "stream {}: max_track_distance must be > 0, got {}",
                self.stream_id, d.max_track_distance
            )));
        }
        if d.max_disappeared_frames == 0 {
            return Err(Error::Validation(format!(
                "stream {}: max_disappeared_frames must be > 0",
                self.stream_id
            )));
        }
        if d.infer_timeout_secs == 0 {
            return Err(Error::Validation(format!(
                "stream {}: infer_timeout_secs must be > 0",
                self.stream_id
            )));
        }
        if let Some(threshold) = d.crowd_alert_threshold {
            if threshold == 0 {
                return Err(Error::Validation(format!(
                    "stream {}: crowd_alert_threshold must be > 0 when set",
                    self.stream_id
                )));
            }
        }

        let s = &self.source;
        if s.connect_timeout_secs == 0 || s.read_timeout_secs == 0 {
            return Err(Error::Validation(format!(
                "stream {}: source timeouts must be > 0",
                self.stream_id
            )));
        }
        if s.reconnect_attempts == 0 {
            return Err(Error::Validation(format!(
                "stream {}: reconnect_attempts must be > 0",
                self.stream_id
            )));
        }

        Ok(())
    }
}

/// Load and validate stream definitions from a JSON file
pub async fn load_stream_configs(path: &Path) -> Result<Vec<StreamConfig>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let configs: Vec<StreamConfig> = serde_json::from_str(&raw)?;
    for config in &configs {
        config.validate()?;
    }
    Ok(configs)
}
