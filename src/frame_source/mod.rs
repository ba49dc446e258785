//! FrameSource - Network Video Capture Abstraction
//!
//! ## Responsibilities
//!
//! - Open a capture resource for a stream URL
//! - Produce a sequence of JPEG frames
//! - Surface connection failures so the worker can retry
//!
//! The production implementation pulls snapshots over HTTP. Workers treat
//! the source as a handle: connect, read frames, close on loop exit.

use crate::config::SourceParams;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One captured frame, JPEG-encoded
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// An open capture resource for one stream
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next frame.
    ///
    /// `Error::Read` signals a transient acquisition failure,
    /// `Error::Connection` a dropped source; both feed the worker's
    /// reconnect path.
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Release the underlying capture resource. Reads after close fail.
    async fn close(&mut self);
}

/// Opens capture resources. One connector is shared by all workers.
#[async_trait]
pub trait FrameSourceConnector: Send + Sync {
    /// Open the source, or fail with `Error::Connection`.
    async fn connect(&self, source_url: &str, params: &SourceParams) -> Result<Box<dyn FrameSource>>;
}

/// HTTP snapshot connector: each read fetches one JPEG from the camera's
/// snapshot endpoint.
pub struct HttpSnapshotConnector;

impl HttpSnapshotConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpSnapshotConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSourceConnector for HttpSnapshotConnector {
    async fn connect(&self, source_url: &str, params: &SourceParams) -> Result<Box<dyn FrameSource>> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(params.connect_timeout_secs))
            .timeout(Duration::from_secs(params.read_timeout_secs))
            .build()
            .map_err(|e| Error::Connection(format!("HTTP client build failed: {e}")))?;

        // Probe once so an unreachable camera fails at open, not at the
        // first read.
        let resp = client
            .get(source_url)
            .send()
            .await
            .map_err(|e| Error::Connection(format!("{source_url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Connection(format!(
                "{source_url}: HTTP {}",
                resp.status()
            )));
        }

        tracing::debug!(source_url = %source_url, "Frame source opened");

        Ok(Box::new(HttpFrameSource {
            client,
            source_url: source_url.to_string(),
            closed: false,
        }))
    }
}

/// HTTP snapshot source
struct HttpFrameSource {
    client: reqwest::Client,
    source_url: String,
    closed: bool,
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn read_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(Error::Connection(format!(
                "{}: source closed",
                self.source_url
            )));
        }

        let resp = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .map_err(|e| Error::Read(format!("{}: {e}", self.source_url)))?;
        if !resp.status().is_success() {
            return Err(Error::Read(format!(
                "{}: HTTP {}",
                self.source_url,
                resp.status()
            )));
        }

        let data = resp
            .bytes()
            .await
            .map_err(|e| Error::Read(format!("{}: {e}", self.source_url)))?
            .to_vec();
        if data.is_empty() {
            return Err(Error::Read(format!("{}: empty frame", self.source_url)));
        }

        Ok(Frame {
            data,
            captured_at: Utc::now(),
        })
    }

    async fn close(&mut self) {
        self.closed = true;
        tracing::debug!(source_url = %self.source_url, "Frame source closed");
    }
}
