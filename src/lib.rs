//! Streamwatch - Multi-Stream Detection Pipeline
//!
//! Ingests live video streams, runs frames through an external
//! object-detection engine, deduplicates detections of the same physical
//! object with a per-stream centroid tracker, and persists events and
//! alerts in a time-partitioned append log.
//!
//! ## Architecture
//!
//! 1. FrameSource - capture abstraction (HTTP snapshot implementation)
//! 2. DetectionEngine - external inference adapter
//! 3. CentroidTracker - stable object identities across frames
//! 4. StreamWorker - per-stream acquire/detect/track/emit loop
//! 5. StreamManager - stream lifecycle registry
//! 6. EventStore - partitioned event/alert persistence with retention
//!
//! ## Design Principles
//!
//! - One worker task per stream; tracker state never leaves its worker
//! - StreamState is mutated only by its owner, read as snapshots
//! - Partition files are the only shared mutable resource, locked per
//!   partition

pub mod config;
pub mod detector;
pub mod error;
pub mod frame_source;
pub mod manager;
pub mod models;
pub mod store;
pub mod tracker;
pub mod worker;

pub use error::{Error, Result};
