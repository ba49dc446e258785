//! Shared models and types
//!
//! Types shared across multiple modules to avoid circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Deployment scenario for a stream. Controls which event types are emitted
/// and which partition files records land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Traffic,
    Security,
    Bar,
    Retail,
}

impl CaseType {
    /// Partition file prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseType::Traffic => "traffic",
            CaseType::Security => "security",
            CaseType::Bar => "bar",
            CaseType::Retail => "retail",
        }
    }

    /// Event type recorded when a new object is first tracked
    pub fn detection_event_type(&self) -> &'static str {
        match self {
            CaseType::Traffic => "vehicle_detected",
            CaseType::Security => "person_detected",
            CaseType::Bar => "patron_detected",
            CaseType::Retail => "customer_detected",
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "traffic" => Ok(CaseType::Traffic),
            "security" => Ok(CaseType::Security),
            "bar" => Ok(CaseType::Bar),
            "retail" => Ok(CaseType::Retail),
            _ => Err(()),
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            _ => Err(()),
        }
    }
}

/// One raw detection from the engine. Produced per frame, consumed
/// immediately by the tracker, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    /// (x1, y1, x2, y2) in pixels
    pub bbox: (f64, f64, f64, f64),
}

impl RawDetection {
    /// Geometric center of the bounding box
    pub fn centroid(&self) -> (f64, f64) {
        let (x1, y1, x2, y2) = self.bbox;
        ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }
}

/// Persisted detection event. Append-only, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub stream_id: String,
    pub event_type: String,
    pub confidence: f32,
    pub metadata: BTreeMap<String, String>,
}

/// Persisted alert. Only `resolved`/`resolved_at` may change after the
/// record is written, via an explicit resolve operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub stream_id: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Stream lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Pending,
    Running,
    Stopped,
    Error,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamStatus::Pending => "pending",
            StreamStatus::Running => "running",
            StreamStatus::Stopped => "stopped",
            StreamStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Per-stream state. Mutated only by the owning worker; everyone else
/// sees cloned snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct StreamState {
    pub stream_id: String,
    pub status: StreamStatus,
    /// Unique track first-seen events, cumulative across restarts
    pub people_detected: u64,
    /// Frames that went through detection (after frame-skip cadence)
    pub frames_processed: u64,
    pub last_detection_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl StreamState {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            status: StreamStatus::Pending,
            people_detected: 0,
            frames_processed: 0,
            last_detection_at: None,
            last_error: None,
        }
    }
}
