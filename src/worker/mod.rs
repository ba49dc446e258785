//! StreamWorker - Per-Stream Detection Loop
//!
//! ## Responsibilities
//!
//! - Drive one stream: acquire frame, detect, track, emit events
//! - Own that stream's tracker and state exclusively
//! - Recover transient source failures with capped exponential backoff
//!
//! Lifecycle: `Pending -> Running -> {Stopped, Error}`, with
//! `Error -> Running` and `Stopped -> Running` on restart. A restart gets
//! a fresh tracker (track ids start over) but keeps the cumulative
//! `people_detected` counter. Stop is cooperative: the signal is observed
//! at the top of the loop and after the current frame's processing; an
//! in-flight detection call is allowed to finish.

use crate::config::{SourceParams, StreamConfig};
use crate::detector::DetectionEngine;
use crate::error::Error;
use crate::frame_source::{FrameSource, FrameSourceConnector};
use crate::models::{Alert, AlertSeverity, Event, RawDetection, StreamState, StreamStatus};
use crate::store::EventStore;
use crate::tracker::{CentroidTracker, TrackedObject};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Why the frame loop returned
enum LoopExit {
    /// Stop signal observed
    Stopped,
    /// Source or engine failure; feeds the reconnect path
    Failed(Error),
}

/// Per-stream mutable cursor: everything a restart discards
struct StreamCursor {
    tracker: CentroidTracker,
    prev_ids: HashSet<u64>,
    frame_counter: u64,
    crowd_armed: bool,
}

/// One stream's worker
pub struct StreamWorker {
    config: Arc<StreamConfig>,
    state: Arc<RwLock<StreamState>>,
    connector: Arc<dyn FrameSourceConnector>,
    engine: Arc<dyn DetectionEngine>,
    store: Arc<EventStore>,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamWorker {
    /// Create a worker in PENDING state. The config is already validated.
    pub fn new(
        config: StreamConfig,
        connector: Arc<dyn FrameSourceConnector>,
        engine: Arc<dyn DetectionEngine>,
        store: Arc<EventStore>,
    ) -> Self {
        let state = Arc::new(RwLock::new(StreamState::new(config.stream_id.clone())));
        Self {
            config: Arc::new(config),
            state,
            connector,
            engine,
            store,
            stop_tx: None,
            handle: None,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Read-only snapshot of the stream state; never blocks the loop
    pub async fn status(&self) -> StreamState {
        self.state.read().await.clone()
    }

    /// Start (or restart) the loop. A start while RUNNING is a no-op
    /// returning the current snapshot.
    pub async fn start(&mut self) -> crate::Result<StreamState> {
        if self.state.read().await.status == StreamStatus::Running {
            tracing::warn!(stream_id = %self.config.stream_id, "Stream already running");
            return Ok(self.status().await);
        }

        // A previous loop may still be draining (e.g. reconnect backoff
        // after entering ERROR). Never run two loops for one stream.
        self.shutdown_task().await;

        {
            let mut state = self.state.write().await;
            state.status = StreamStatus::Running;
            state.last_error = None;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);
        self.handle = Some(tokio::spawn(run_loop(
            self.config.clone(),
            self.state.clone(),
            self.connector.clone(),
            self.engine.clone(),
            self.store.clone(),
            stop_rx,
        )));

        tracing::info!(
            stream_id = %self.config.stream_id,
            source_url = %self.config.source_url,
            case_type = %self.config.case_type,
            "Stream started"
        );
        Ok(self.status().await)
    }

    /// Signal the loop to exit after its current iteration and wait for
    /// it, so the transition is visible on return. Idempotent.
    pub async fn stop(&mut self) -> StreamState {
        let had_task = self.handle.is_some();
        self.shutdown_task().await;

        let mut state = self.state.write().await;
        if !had_task && state.status == StreamStatus::Pending {
            state.status = StreamStatus::Stopped;
        }
        tracing::info!(stream_id = %state.stream_id, status = %state.status, "Stream stop requested");
        state.clone()
    }

    async fn shutdown_task(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn run_loop(
    config: Arc<StreamConfig>,
    state: Arc<RwLock<StreamState>>,
    connector: Arc<dyn FrameSourceConnector>,
    engine: Arc<dyn DetectionEngine>,
    store: Arc<EventStore>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut cursor = StreamCursor {
        tracker: CentroidTracker::new(
            config.detection.max_track_distance,
            config.detection.max_disappeared_frames,
        ),
        prev_ids: HashSet::new(),
        frame_counter: 0,
        crowd_armed: true,
    };
    let mut failures: u32 = 0;

    if let Err(e) = tokio::fs::create_dir_all(&config.output_dir).await {
        tracing::warn!(
            stream_id = %config.stream_id,
            output_dir = %config.output_dir.display(),
            error = %e,
            "Output directory unavailable"
        );
    }

    loop {
        if *stop_rx.borrow() {
            mark_stopped(&state).await;
            return;
        }

        // Open the source; the stop signal may abandon a pending connect.
        let connect = timeout(
            Duration::from_secs(config.source.connect_timeout_secs),
            connector.connect(&config.source_url, &config.source),
        );
        let connected = tokio::select! {
            _ = stop_rx.changed() => {
                mark_stopped(&state).await;
                return;
            }
            res = connect => match res {
                Ok(Ok(source)) => Ok(source),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(Error::Connection(format!(
                    "{}: connect timed out",
                    config.source_url
                ))),
            },
        };

        let mut source = match connected {
            Ok(source) => source,
            Err(e) => {
                if !handle_failure(&config, &state, &mut failures, &e, &mut stop_rx).await {
                    return;
                }
                continue;
            }
        };

        failures = 0;
        {
            let mut st = state.write().await;
            st.status = StreamStatus::Running;
            st.last_error = None;
        }
        tracing::info!(stream_id = %config.stream_id, "Stream source connected");

        let exit = process_frames(
            &config,
            &state,
            engine.as_ref(),
            &store,
            &mut cursor,
            source.as_mut(),
            &mut stop_rx,
        )
        .await;
        source.close().await;

        match exit {
            LoopExit::Stopped => {
                mark_stopped(&state).await;
                return;
            }
            LoopExit::Failed(e) => {
                if !handle_failure(&config, &state, &mut failures, &e, &mut stop_rx).await {
                    return;
                }
            }
        }
    }
}

/// Record a transient failure and back off. Returns false when the retry
/// budget is exhausted (worker stays in ERROR until an explicit restart)
/// or a stop arrived during the backoff sleep.
async fn handle_failure(
    config: &StreamConfig,
    state: &Arc<RwLock<StreamState>>,
    failures: &mut u32,
    error: &Error,
    stop_rx: &mut watch::Receiver<bool>,
) -> bool {
    *failures += 1;
    {
        let mut st = state.write().await;
        st.status = StreamStatus::Error;
        st.last_error = Some(error.to_string());
    }

    if *failures > config.source.reconnect_attempts {
        tracing::error!(
            stream_id = %config.stream_id,
            error = %error,
            attempts = *failures,
            "Retry budget exhausted, stream requires explicit restart"
        );
        return false;
    }

    let delay = backoff_delay(&config.source, *failures);
    tracing::warn!(
        stream_id = %config.stream_id,
        error = %error,
        attempt = *failures,
        delay_ms = delay.as_millis() as u64,
        "Stream failure, reconnecting after backoff"
    );

    tokio::select! {
        _ = stop_rx.changed() => {
            mark_stopped(state).await;
            false
        }
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Exponential backoff from the base delay, capped
fn backoff_delay(source: &SourceParams, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = source
        .reconnect_base_delay_ms
        .saturating_mul(1u64 << exp)
        .min(source.reconnect_max_delay_ms);
    Duration::from_millis(delay)
}

async fn mark_stopped(state: &Arc<RwLock<StreamState>>) {
    let mut st = state.write().await;
    st.status = StreamStatus::Stopped;
    tracing::info!(stream_id = %st.stream_id, "Stream stopped");
}

/// Inner frame loop for one open source. Returns on stop or on the first
/// transient failure; the caller owns reconnect policy.
async fn process_frames(
    config: &StreamConfig,
    state: &Arc<RwLock<StreamState>>,
    engine: &dyn DetectionEngine,
    store: &EventStore,
    cursor: &mut StreamCursor,
    source: &mut dyn FrameSource,
    stop_rx: &mut watch::Receiver<bool>,
) -> LoopExit {
    let d = &config.detection;

    loop {
        if *stop_rx.borrow() {
            return LoopExit::Stopped;
        }

        // A frame not yet acquired may be abandoned on stop; a detection
        // call below may not.
        let frame = tokio::select! {
            _ = stop_rx.changed() => return LoopExit::Stopped,
            res = timeout(
                Duration::from_secs(config.source.read_timeout_secs),
                source.read_frame(),
            ) => match res {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => return LoopExit::Failed(e),
                Err(_) => return LoopExit::Failed(Error::Read(format!(
                    "{}: frame read timed out",
                    config.source_url
                ))),
            },
        };

        cursor.frame_counter += 1;
        if d.frame_skip > 0 && (cursor.frame_counter - 1) % (d.frame_skip as u64 + 1) != 0 {
            continue;
        }

        let detections = match timeout(
            Duration::from_secs(d.infer_timeout_secs),
            engine.infer(&frame, d.min_confidence, &d.classes),
        )
        .await
        {
            Ok(Ok(detections)) => detections,
            Ok(Err(e)) => return LoopExit::Failed(Error::Read(format!("inference failed: {e}"))),
            Err(_) => return LoopExit::Failed(Error::Read("inference timed out".into())),
        };

        {
            let mut st = state.write().await;
            st.frames_processed += 1;
        }

        // The engine pre-filters, but the worker still enforces the
        // stream's own thresholds.
        let filtered: Vec<RawDetection> = detections
            .into_iter()
            .filter(|det| det.confidence >= d.min_confidence && d.classes.contains(&det.class_id))
            .collect();

        let live = match cursor.tracker.update(&filtered) {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(
                    stream_id = %config.stream_id,
                    error = %e,
                    "Rejected detections, frame skipped for tracking"
                );
                continue;
            }
        };

        let new_tracks: Vec<&TrackedObject> = live
            .iter()
            .filter(|t| !cursor.prev_ids.contains(&t.track_id))
            .collect();

        if !new_tracks.is_empty() {
            for track in &new_tracks {
                let event = Event {
                    timestamp: frame.captured_at,
                    stream_id: config.stream_id.clone(),
                    event_type: config.case_type.detection_event_type().to_string(),
                    confidence: track.confidence,
                    metadata: BTreeMap::from([
                        ("track_id".to_string(), track.track_id.to_string()),
                        ("class_id".to_string(), track.class_id.to_string()),
                        (
                            "centroid".to_string(),
                            format!("{:.1}:{:.1}", track.centroid.0, track.centroid.1),
                        ),
                    ]),
                };
                // A storage outage must not tear down frame processing;
                // the error is logged and the loop goes on.
                if let Err(e) = store.append_event(config.case_type, &event).await {
                    tracing::error!(
                        stream_id = %config.stream_id,
                        error = %e,
                        "Event append failed"
                    );
                }
            }

            let total = {
                let mut st = state.write().await;
                st.people_detected += new_tracks.len() as u64;
                st.last_detection_at = Some(frame.captured_at);
                st.people_detected
            };
            tracing::info!(
                stream_id = %config.stream_id,
                new_tracks = new_tracks.len(),
                people_detected = total,
                "New objects tracked"
            );
        }

        if let Some(threshold) = d.crowd_alert_threshold {
            let count = live.len() as u32;
            if count >= threshold && cursor.crowd_armed {
                cursor.crowd_armed = false;
                let alert = Alert {
                    timestamp: frame.captured_at,
                    stream_id: config.stream_id.clone(),
                    alert_type: "crowding".to_string(),
                    severity: AlertSeverity::High,
                    message: format!("{count} tracked objects in view (threshold {threshold})"),
                    metadata: BTreeMap::from([(
                        "track_count".to_string(),
                        count.to_string(),
                    )]),
                    resolved: false,
                    resolved_at: None,
                };
                match store.append_alert(config.case_type, &alert).await {
                    Ok(()) => tracing::warn!(
                        stream_id = %config.stream_id,
                        track_count = count,
                        threshold = threshold,
                        "Crowding alert raised"
                    ),
                    Err(e) => tracing::error!(
                        stream_id = %config.stream_id,
                        error = %e,
                        "Alert append failed"
                    ),
                }
            } else if count < threshold {
                cursor.crowd_armed = true;
            }
        }

        cursor.prev_ids = live.iter().map(|t| t.track_id).collect();

        if config.source.poll_interval_ms > 0 {
            tokio::select! {
                _ = stop_rx.changed() => return LoopExit::Stopped,
                _ = tokio::time::sleep(Duration::from_millis(config.source.poll_interval_ms)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionParams;
    use crate::frame_source::Frame;
    use crate::models::CaseType;
    use crate::store::QueryFilter;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    /// Source yielding dummy JPEG frames; blocks forever once the budget
    /// is spent so the worker idles instead of erroring.
    struct ScriptedSource {
        remaining: Option<u32>,
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn read_frame(&mut self) -> crate::Result<Frame> {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    return std::future::pending().await;
                }
                *remaining -= 1;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(Frame {
                data: vec![0xFF, 0xD8, 0xFF, 0xD9],
                captured_at: Utc::now(),
            })
        }

        async fn close(&mut self) {}
    }

    struct ScriptedConnector {
        /// None = unlimited frames
        frame_budget: Option<u32>,
        fail: bool,
        connects: AtomicU32,
    }

    impl ScriptedConnector {
        fn ok(frame_budget: Option<u32>) -> Self {
            Self {
                frame_budget,
                fail: false,
                connects: AtomicU32::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                frame_budget: None,
                fail: true,
                connects: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl FrameSourceConnector for ScriptedConnector {
        async fn connect(
            &self,
            source_url: &str,
            _params: &SourceParams,
        ) -> crate::Result<Box<dyn FrameSource>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Connection(format!("{source_url}: refused")));
            }
            Ok(Box::new(ScriptedSource {
                remaining: self.frame_budget,
            }))
        }
    }

    /// Engine that pops one scripted detection list per frame, then
    /// returns empty frames.
    struct ScriptedEngine {
        script: Mutex<VecDeque<Vec<RawDetection>>>,
        calls: AtomicU32,
    }

    impl ScriptedEngine {
        fn new(script: Vec<Vec<RawDetection>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        async fn load(&self, script: Vec<Vec<RawDetection>>) {
            *self.script.lock().await = script.into();
        }
    }

    #[async_trait]
    impl DetectionEngine for ScriptedEngine {
        async fn infer(
            &self,
            _frame: &Frame,
            _min_confidence: f32,
            _classes: &std::collections::BTreeSet<u32>,
        ) -> crate::Result<Vec<RawDetection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.lock().await.pop_front().unwrap_or_default())
        }
    }

    fn person_at(x: f64, y: f64) -> RawDetection {
        RawDetection {
            class_id: 0,
            confidence: 0.9,
            bbox: (x - 20.0, y - 40.0, x + 20.0, y + 40.0),
        }
    }

    fn test_config(stream_id: &str) -> StreamConfig {
        StreamConfig {
            stream_id: stream_id.into(),
            source_url: format!("http://test.local/{stream_id}"),
            case_type: CaseType::Security,
            output_dir: PathBuf::from("/tmp/streamwatch-test"),
            detection: DetectionParams {
                max_disappeared_frames: 3,
                ..Default::default()
            },
            source: SourceParams {
                reconnect_attempts: 2,
                reconnect_base_delay_ms: 1,
                reconnect_max_delay_ms: 4,
                poll_interval_ms: 1,
                ..Default::default()
            },
        }
    }

    async fn wait_until<F>(worker: &StreamWorker, pred: F) -> StreamState
    where
        F: Fn(&StreamState) -> bool,
    {
        for _ in 0..500 {
            let snapshot = worker.status().await;
            if pred(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached: {:?}", worker.status().await);
    }

    async fn new_store() -> (TempDir, Arc<EventStore>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(EventStore::new(dir.path()).await.unwrap());
        (dir, store)
    }

    #[tokio::test]
    async fn counts_unique_tracks_not_detections() {
        let (_dir, store) = new_store().await;
        let engine = Arc::new(ScriptedEngine::new(vec![
            vec![person_at(100.0, 100.0)],
            vec![person_at(110.0, 100.0)],
            vec![person_at(120.0, 100.0)],
        ]));
        let mut worker = StreamWorker::new(
            test_config("cam1"),
            Arc::new(ScriptedConnector::ok(None)),
            engine,
            store.clone(),
        );

        worker.start().await.unwrap();
        let snapshot = wait_until(&worker, |s| s.frames_processed >= 4).await;
        worker.stop().await;

        // One physical object seen in three frames is one person.
        assert_eq!(snapshot.people_detected, 1);
        assert!(snapshot.last_detection_at.is_some());

        let events = store.query_events(&QueryFilter::default()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "person_detected");
        assert_eq!(events[0].metadata.get("track_id").unwrap(), "1");
    }

    #[tokio::test]
    async fn restart_resets_track_ids_but_keeps_counter() {
        let (_dir, store) = new_store().await;
        let engine = Arc::new(ScriptedEngine::new(vec![vec![person_at(100.0, 100.0)]]));
        let mut worker = StreamWorker::new(
            test_config("cam1"),
            Arc::new(ScriptedConnector::ok(None)),
            engine.clone(),
            store.clone(),
        );

        worker.start().await.unwrap();
        wait_until(&worker, |s| s.people_detected == 1).await;
        let stopped = worker.stop().await;
        assert_eq!(stopped.status, StreamStatus::Stopped);

        engine.load(vec![vec![person_at(100.0, 100.0)]]).await;
        worker.start().await.unwrap();
        let snapshot = wait_until(&worker, |s| s.people_detected == 2).await;
        worker.stop().await;

        assert_eq!(snapshot.people_detected, 2);

        // Both events carry track_id 1: the restart discarded the old
        // tracker, so the id sequence started over.
        let events = store.query_events(&QueryFilter::default()).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| e.metadata.get("track_id").unwrap() == "1"));
    }

    #[tokio::test]
    async fn connect_failures_exhaust_retry_budget() {
        let (_dir, store) = new_store().await;
        let connector = Arc::new(ScriptedConnector::failing());
        let mut worker = StreamWorker::new(
            test_config("cam1"),
            connector.clone(),
            Arc::new(ScriptedEngine::new(vec![])),
            store,
        );

        worker.start().await.unwrap();
        let snapshot = wait_until(&worker, |s| {
            s.status == StreamStatus::Error && s.last_error.is_some()
        })
        .await;
        assert!(snapshot.last_error.unwrap().contains("refused"));

        // Initial attempt plus the configured two retries.
        wait_until(&worker, |_| connector.connects.load(Ordering::SeqCst) == 3).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn restart_after_error_runs_again() {
        let (_dir, store) = new_store().await;
        let connector = Arc::new(ScriptedConnector::failing());
        let mut worker = StreamWorker::new(
            test_config("cam1"),
            connector,
            Arc::new(ScriptedEngine::new(vec![])),
            store.clone(),
        );

        worker.start().await.unwrap();
        wait_until(&worker, |s| s.status == StreamStatus::Error).await;

        // ERROR -> RUNNING on explicit restart; the fresh attempt clears
        // last_error until it fails again.
        worker.start().await.unwrap();
        wait_until(&worker, |s| s.status == StreamStatus::Error).await;
        worker.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (_dir, store) = new_store().await;
        let mut worker = StreamWorker::new(
            test_config("cam1"),
            Arc::new(ScriptedConnector::ok(None)),
            Arc::new(ScriptedEngine::new(vec![])),
            store,
        );

        worker.start().await.unwrap();
        wait_until(&worker, |s| s.frames_processed >= 1).await;

        let first = worker.stop().await;
        assert_eq!(first.status, StreamStatus::Stopped);
        let second = worker.stop().await;
        assert_eq!(second.status, StreamStatus::Stopped);
    }

    #[tokio::test]
    async fn stop_before_start_marks_pending_stream_stopped() {
        let (_dir, store) = new_store().await;
        let mut worker = StreamWorker::new(
            test_config("cam1"),
            Arc::new(ScriptedConnector::ok(None)),
            Arc::new(ScriptedEngine::new(vec![])),
            store,
        );

        assert_eq!(worker.status().await.status, StreamStatus::Pending);
        let snapshot = worker.stop().await;
        assert_eq!(snapshot.status, StreamStatus::Stopped);
    }

    #[tokio::test]
    async fn frame_skip_halves_detection_cadence() {
        let (_dir, store) = new_store().await;
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        let mut config = test_config("cam1");
        config.detection.frame_skip = 1;

        let mut worker = StreamWorker::new(
            config,
            Arc::new(ScriptedConnector::ok(Some(6))),
            engine.clone(),
            store,
        );

        worker.start().await.unwrap();
        let snapshot = wait_until(&worker, |s| s.frames_processed >= 3).await;
        worker.stop().await;

        // Six frames at skip=1 process frames 1, 3 and 5.
        assert_eq!(snapshot.frames_processed, 3);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn crowding_alert_fires_once_per_excursion() {
        let (_dir, store) = new_store().await;
        let crowd = vec![
            person_at(100.0, 100.0),
            person_at(300.0, 100.0),
            person_at(500.0, 100.0),
        ];
        let engine = Arc::new(ScriptedEngine::new(vec![
            crowd.clone(),
            crowd.clone(),
            crowd,
        ]));

        let mut config = test_config("cam1");
        config.detection.crowd_alert_threshold = Some(3);

        let mut worker = StreamWorker::new(
            config,
            Arc::new(ScriptedConnector::ok(None)),
            engine,
            store.clone(),
        );

        worker.start().await.unwrap();
        wait_until(&worker, |s| s.frames_processed >= 4).await;
        worker.stop().await;

        // Three frames above the threshold, one alert.
        let alerts = store.query_alerts(&QueryFilter::default()).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "crowding");
        assert_eq!(alerts[0].severity, AlertSeverity::High);
        assert!(!alerts[0].resolved);
    }
}
