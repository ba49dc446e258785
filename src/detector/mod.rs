//! DetectionEngine - External Object-Detection Adapter
//!
//! ## Responsibilities
//!
//! - Send frames to the inference service
//! - Parse responses into raw detections
//!
//! The engine is a black box: given a frame it returns bounding boxes with
//! class and confidence. It is stateless and safe to call concurrently
//! from different workers.

use crate::error::{Error, Result};
use crate::frame_source::Frame;
use crate::models::RawDetection;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Object-detection engine contract
#[async_trait]
pub trait DetectionEngine: Send + Sync {
    /// Run inference on one frame. Returns detections in the order the
    /// engine produced them, pre-filtered to `min_confidence` and
    /// `classes`.
    async fn infer(
        &self,
        frame: &Frame,
        min_confidence: f32,
        classes: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>>;
}

/// HTTP inference service client
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
}

/// One detection in the service response
#[derive(Debug, Clone, Deserialize)]
struct DetectionDto {
    class_id: u32,
    confidence: f32,
    /// [x1, y1, x2, y2] in pixels
    bbox: [f64; 4],
}

/// Inference response (matches the detector's /v1/detect schema)
#[derive(Debug, Clone, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<DetectionDto>,
}

impl HttpDetector {
    /// Create a client with the default 30s request timeout
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Check detector health
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DetectionEngine for HttpDetector {
    async fn infer(
        &self,
        frame: &Frame,
        min_confidence: f32,
        classes: &BTreeSet<u32>,
    ) -> Result<Vec<RawDetection>> {
        let url = format!("{}/v1/detect", self.base_url);

        let class_list = classes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let form = Form::new()
            .part(
                "image",
                Part::bytes(frame.data.clone())
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("min_confidence", min_confidence.to_string())
            .text("classes", class_list)
            .text("captured_at", frame.captured_at.to_rfc3339());

        let resp = self.client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Read(format!(
                "inference failed: HTTP {}",
                resp.status()
            )));
        }

        let result: DetectResponse = resp.json().await?;

        Ok(result
            .detections
            .into_iter()
            .map(|d| RawDetection {
                class_id: d.class_id,
                confidence: d.confidence,
                bbox: (d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]),
            })
            .collect())
    }
}
