//! CentroidTracker - Object Identity Across Frames
//!
//! ## Responsibilities
//!
//! - Turn raw per-frame detections into stable object identities
//! - Age and deregister tracks that stop being detected
//!
//! One tracker per stream, owned exclusively by that stream's worker.
//! Pure computation, no I/O: matching is greedy over the pairwise
//! centroid distance matrix, smallest distance first, with a hard
//! distance cutoff. Tie-breaks resolve by (track id, detection index)
//! so a fixed input ordering always reproduces the same assignment.

use crate::error::{Error, Result};
use crate::models::RawDetection;
use std::collections::BTreeMap;

/// A persistent identity assigned to an object observed across frames.
/// Lives only in the owning worker's memory.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    /// Monotonic per-tracker id; restarts from 1 with a fresh tracker
    pub track_id: u64,
    pub centroid: (f64, f64),
    /// Consecutive frames without a matching detection
    pub disappeared_count: u32,
    /// Class of the most recently matched detection
    pub class_id: u32,
    /// Confidence of the most recently matched detection
    pub confidence: f32,
}

/// Centroid tracker for one stream
pub struct CentroidTracker {
    /// Live tracks, keyed by id. BTreeMap keeps iteration in id order,
    /// which is what makes tie-breaking deterministic.
    tracks: BTreeMap<u64, TrackedObject>,
    next_id: u64,
    max_distance: f64,
    max_disappeared: u32,
}

impl CentroidTracker {
    /// Create a tracker. Parameters come from an already-validated
    /// `DetectionParams`.
    pub fn new(max_distance: f64, max_disappeared: u32) -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
            max_distance,
            max_disappeared,
        }
    }

    /// Number of live tracks
    pub fn live_count(&self) -> usize {
        self.tracks.len()
    }

    /// Process one frame's detections and return the live track set,
    /// in track-id order.
    ///
    /// An empty detection list ages every track by one step and registers
    /// nothing. Invalid input (NaN or non-finite coordinates) is rejected
    /// before any state changes, so the frame is skipped for tracking.
    pub fn update(&mut self, detections: &[RawDetection]) -> Result<Vec<TrackedObject>> {
        for (idx, det) in detections.iter().enumerate() {
            let (cx, cy) = det.centroid();
            if !cx.is_finite() || !cy.is_finite() || !det.confidence.is_finite() {
                return Err(Error::Validation(format!(
                    "detection {idx}: non-finite centroid or confidence"
                )));
            }
        }

        if self.tracks.is_empty() {
            for det in detections {
                self.register(det);
            }
            return Ok(self.snapshot());
        }

        // Pairwise distances, sorted ascending with a stable tie-break.
        let mut pairs: Vec<(f64, u64, usize)> = Vec::new();
        for (&track_id, track) in &self.tracks {
            for (det_idx, det) in detections.iter().enumerate() {
                let (cx, cy) = det.centroid();
                let dist = ((track.centroid.0 - cx).powi(2) + (track.centroid.1 - cy).powi(2)).sqrt();
                if dist <= self.max_distance {
                    pairs.push((dist, track_id, det_idx));
                }
            }
        }
        pairs.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .expect("distances validated finite")
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut matched_tracks: Vec<u64> = Vec::new();
        let mut matched_dets: Vec<usize> = Vec::new();
        for (_, track_id, det_idx) in pairs {
            if matched_tracks.contains(&track_id) || matched_dets.contains(&det_idx) {
                continue;
            }
            let det = &detections[det_idx];
            let track = self.tracks.get_mut(&track_id).expect("track exists");
            track.centroid = det.centroid();
            track.disappeared_count = 0;
            track.class_id = det.class_id;
            track.confidence = det.confidence;
            matched_tracks.push(track_id);
            matched_dets.push(det_idx);
        }

        // Unmatched tracks age; reaching the maximum deregisters them.
        // This is the only destruction path.
        let mut expired: Vec<u64> = Vec::new();
        for (&track_id, track) in self.tracks.iter_mut() {
            if matched_tracks.contains(&track_id) {
                continue;
            }
            track.disappeared_count += 1;
            if track.disappeared_count >= self.max_disappeared {
                expired.push(track_id);
            }
        }
        for track_id in expired {
            self.tracks.remove(&track_id);
        }

        // Unmatched detections become new tracks.
        for (det_idx, det) in detections.iter().enumerate() {
            if !matched_dets.contains(&det_idx) {
                self.register(det);
            }
        }

        Ok(self.snapshot())
    }

    fn register(&mut self, det: &RawDetection) {
        let track_id = self.next_id;
        self.next_id += 1;
        self.tracks.insert(
            track_id,
            TrackedObject {
                track_id,
                centroid: det.centroid(),
                disappeared_count: 0,
                class_id: det.class_id,
                confidence: det.confidence,
            },
        );
    }

    fn snapshot(&self) -> Vec<TrackedObject> {
        self.tracks.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det_at(x: f64, y: f64) -> RawDetection {
        RawDetection {
            class_id: 0,
            confidence: 0.9,
            bbox: (x - 10.0, y - 10.0, x + 10.0, y + 10.0),
        }
    }

    #[test]
    fn registers_all_on_first_frame() {
        let mut tracker = CentroidTracker::new(50.0, 3);
        let live = tracker.update(&[det_at(100.0, 100.0), det_at(300.0, 300.0)]).unwrap();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].track_id, 1);
        assert_eq!(live[1].track_id, 2);
    }

    #[test]
    fn empty_frame_ages_every_track() {
        let mut tracker = CentroidTracker::new(50.0, 10);
        tracker.update(&[det_at(100.0, 100.0), det_at(300.0, 300.0)]).unwrap();

        let live = tracker.update(&[]).unwrap();
        assert_eq!(live.len(), 2);
        assert!(live.iter().all(|t| t.disappeared_count == 1));

        let live = tracker.update(&[]).unwrap();
        assert!(live.iter().all(|t| t.disappeared_count == 2));
    }

    #[test]
    fn small_movement_keeps_identity() {
        let mut tracker = CentroidTracker::new(50.0, 3);
        tracker.update(&[det_at(100.0, 100.0)]).unwrap();
        let live = tracker.update(&[det_at(130.0, 100.0)]).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].track_id, 1);
        assert_eq!(live[0].centroid, (130.0, 100.0));
        assert_eq!(live[0].disappeared_count, 0);
    }

    #[test]
    fn large_movement_spawns_new_track() {
        let mut tracker = CentroidTracker::new(50.0, 3);
        tracker.update(&[det_at(100.0, 100.0)]).unwrap();
        // Jump beyond the cutoff: old track ages, new track registers.
        let live = tracker.update(&[det_at(400.0, 400.0)]).unwrap();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].track_id, 1);
        assert_eq!(live[0].disappeared_count, 1);
        assert_eq!(live[1].track_id, 2);
        assert_eq!(live[1].disappeared_count, 0);
    }

    #[test]
    fn disappearance_then_return_allocates_fresh_id() {
        // max_track_distance=50, max_disappeared_frames=3.
        // Frame 1 detects at (100,100) -> track 1. Frames 2-4 detect
        // nothing: ages to 3 and is deregistered. Frame 5 detects at the
        // same spot -> track 2, not a reused track 1.
        let mut tracker = CentroidTracker::new(50.0, 3);
        let live = tracker.update(&[det_at(100.0, 100.0)]).unwrap();
        assert_eq!(live[0].track_id, 1);

        tracker.update(&[]).unwrap();
        tracker.update(&[]).unwrap();
        let live = tracker.update(&[]).unwrap();
        assert!(live.is_empty());

        let live = tracker.update(&[det_at(100.0, 100.0)]).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].track_id, 2);
    }

    #[test]
    fn greedy_matching_prefers_globally_closest_pair() {
        let mut tracker = CentroidTracker::new(100.0, 3);
        tracker.update(&[det_at(0.0, 0.0), det_at(100.0, 0.0)]).unwrap();
        // Detection at (90,0) is closest to track 2; (30,0) then pairs
        // with track 1.
        let live = tracker.update(&[det_at(30.0, 0.0), det_at(90.0, 0.0)]).unwrap();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].track_id, 1);
        assert_eq!(live[0].centroid, (30.0, 0.0));
        assert_eq!(live[1].track_id, 2);
        assert_eq!(live[1].centroid, (90.0, 0.0));
    }

    #[test]
    fn equal_distances_resolve_by_track_order() {
        let mut tracker = CentroidTracker::new(100.0, 3);
        tracker.update(&[det_at(0.0, 0.0), det_at(20.0, 0.0)]).unwrap();
        // One detection equidistant from both tracks binds to track 1.
        let live = tracker.update(&[det_at(10.0, 0.0)]).unwrap();
        let track1 = live.iter().find(|t| t.track_id == 1).unwrap();
        let track2 = live.iter().find(|t| t.track_id == 2).unwrap();
        assert_eq!(track1.centroid, (10.0, 0.0));
        assert_eq!(track1.disappeared_count, 0);
        assert_eq!(track2.disappeared_count, 1);
    }

    #[test]
    fn rejects_nan_input_without_mutating() {
        let mut tracker = CentroidTracker::new(50.0, 3);
        tracker.update(&[det_at(100.0, 100.0)]).unwrap();

        let bad = RawDetection {
            class_id: 0,
            confidence: 0.9,
            bbox: (f64::NAN, 0.0, 10.0, 10.0),
        };
        let err = tracker.update(&[bad]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // The rejected frame must not have aged the existing track.
        assert_eq!(tracker.live_count(), 1);
        let live = tracker.update(&[det_at(100.0, 100.0)]).unwrap();
        assert_eq!(live[0].track_id, 1);
        assert_eq!(live[0].disappeared_count, 0);
    }

    #[test]
    fn match_at_exact_cutoff_distance_binds() {
        let mut tracker = CentroidTracker::new(50.0, 3);
        tracker.update(&[det_at(100.0, 100.0)]).unwrap();
        let live = tracker.update(&[det_at(150.0, 100.0)]).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].track_id, 1);
    }
}
