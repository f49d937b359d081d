//! Per-session tracking state, skip schedule and timing statistics.
//!
//! One instance of each lives inside a scheduler and is never shared between
//! sessions.

use crate::config::{duration_ms, TrackingParams};
use crate::quality::is_tracking_stable;
use contour_core::{BoundingBox, DetectionResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const BBOX_HISTORY_CAPACITY: usize = 5;
pub const FRAME_TIME_WINDOW: usize = 10;

// --- Search-region expansion bounds and steps ---
const MIN_EXPANSION: f64 = 1.0;
const MAX_EXPANSION: f64 = 2.0;
const EXPANSION_SHRINK: f64 = 0.1;
const EXPANSION_GROW: f64 = 0.2;

/// Confidence multiplier applied on every missed detection.
const CONFIDENCE_DECAY: f64 = 0.9;

/// Frame-skip schedule, adapted from measured load and tracking quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveScheduleConfig {
    pub base_skip: u32,
    pub max_skip: u32,
    pub current_skip: u32,
    #[serde(with = "duration_ms", rename = "performance_threshold_ms")]
    pub performance_threshold: Duration,
    pub quality_threshold: f64,
}

impl Default for AdaptiveScheduleConfig {
    fn default() -> Self {
        Self {
            base_skip: 2,
            max_skip: 8,
            current_skip: 2,
            performance_threshold: Duration::from_millis(33),
            quality_threshold: 0.7,
        }
    }
}

impl AdaptiveScheduleConfig {
    /// Clamp fields into their legal ranges.
    pub fn validated(mut self) -> Self {
        self.max_skip = self.max_skip.max(1);
        self.base_skip = self.base_skip.clamp(1, self.max_skip);
        self.current_skip = self.current_skip.clamp(1, self.max_skip);
        self.quality_threshold = if self.quality_threshold.is_finite() {
            self.quality_threshold.clamp(0.0, 1.0)
        } else {
            0.7
        };
        self
    }

    /// Adjust `current_skip` from the latest quality and average frame time.
    ///
    /// Slow frames raise the skip; fast frames with poor quality lower it;
    /// fast frames with good quality relax it back to `base_skip`. Returns
    /// whether the skip changed.
    pub fn adapt(&mut self, quality: f64, avg_processing: Duration) -> bool {
        let before = self.current_skip;
        let avg = avg_processing.as_secs_f64();
        let threshold = self.performance_threshold.as_secs_f64();

        if avg > threshold * 1.2 {
            self.current_skip = (self.current_skip + 1).min(self.max_skip);
        } else if avg < threshold * 0.8 && quality < self.quality_threshold {
            self.current_skip = self.current_skip.saturating_sub(1).max(1);
        } else if avg < threshold && quality > self.quality_threshold {
            self.current_skip = self.base_skip;
        }

        self.current_skip = self.current_skip.clamp(1, self.max_skip.max(1));
        self.current_skip != before
    }
}

/// Recent face boxes, oldest first, capped at [`BBOX_HISTORY_CAPACITY`].
#[derive(Debug, Clone, Default)]
pub struct BboxHistory(VecDeque<BoundingBox>);

impl BboxHistory {
    pub fn push(&mut self, bbox: BoundingBox) {
        if self.0.len() == BBOX_HISTORY_CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(bbox);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&BoundingBox> {
        self.0.back()
    }

    /// The two most recent boxes as `(previous, latest)`.
    pub fn last_two(&self) -> Option<(&BoundingBox, &BoundingBox)> {
        let n = self.0.len();
        if n < 2 {
            return None;
        }
        Some((&self.0[n - 2], &self.0[n - 1]))
    }

    pub fn to_vec(&self) -> Vec<BoundingBox> {
        self.0.iter().copied().collect()
    }
}

/// Mutable tracking state machine, driven once per processed frame.
///
/// Searching (`is_tracking == false`) becomes Tracking once recent boxes are
/// stable, degrades while `lost_frames > 0`, and falls back to Searching once
/// `lost_frames` exceeds the configured limit.
#[derive(Debug, Clone)]
pub struct TrackingState {
    pub is_tracking: bool,
    pub lost_frames: u32,
    pub consecutive_detections: u32,
    pub stability_counter: u32,
    pub tracking_confidence: f64,
    pub last_bbox: Option<BoundingBox>,
    pub bbox_history: BboxHistory,
    pub search_region_expansion: f64,
    pub last_successful_frame: Option<u64>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            is_tracking: false,
            lost_frames: 0,
            consecutive_detections: 0,
            stability_counter: 0,
            tracking_confidence: 0.0,
            last_bbox: None,
            bbox_history: BboxHistory::default(),
            search_region_expansion: MIN_EXPANSION,
            last_successful_frame: None,
        }
    }
}

impl TrackingState {
    /// Fold one detection attempt into the state.
    pub fn update(&mut self, detection: Option<&DetectionResult>, frame_number: u64, params: &TrackingParams) {
        match detection.filter(|d| d.is_valid()) {
            Some(d) => self.record_success(d, frame_number, params),
            None => self.record_failure(params),
        }
    }

    fn record_success(&mut self, detection: &DetectionResult, frame_number: u64, params: &TrackingParams) {
        self.consecutive_detections += 1;
        self.lost_frames = 0;
        self.last_bbox = Some(detection.bbox);
        self.tracking_confidence = detection.confidence.clamp(0.0, 1.0);
        self.last_successful_frame = Some(frame_number);
        self.bbox_history.push(detection.bbox);

        if is_tracking_stable(&self.bbox_history.to_vec(), params.stability_threshold_px) {
            self.stability_counter += 1;
            self.is_tracking = true;
        } else {
            self.stability_counter = self.stability_counter.saturating_sub(1);
        }

        self.search_region_expansion = (self.search_region_expansion - EXPANSION_SHRINK).max(MIN_EXPANSION);
    }

    fn record_failure(&mut self, params: &TrackingParams) {
        self.lost_frames += 1;
        self.consecutive_detections = 0;
        self.tracking_confidence = (self.tracking_confidence * CONFIDENCE_DECAY).clamp(0.0, 1.0);
        self.search_region_expansion = (self.search_region_expansion + EXPANSION_GROW).min(MAX_EXPANSION);

        if self.lost_frames > params.max_lost_frames {
            self.is_tracking = false;
            self.stability_counter = 0;
            self.bbox_history.clear();
        }
    }

    /// Stable enough to report: held steady long enough and detected repeatedly.
    pub fn is_stable(&self, params: &TrackingParams) -> bool {
        self.stability_counter >= params.min_stability_frames
            && self.consecutive_detections >= params.min_consecutive_detections
    }

    /// Lost long enough that a recovery search should run.
    pub fn needs_recovery(&self, params: &TrackingParams) -> bool {
        self.lost_frames > params.max_lost_frames / 2
    }
}

/// Rolling frame-time window and FPS counter.
#[derive(Debug, Clone)]
pub struct PerformanceStats {
    frame_times: VecDeque<Duration>,
    avg_processing_time: Duration,
    fps_counter: u32,
    last_fps_time: Instant,
    fps: f64,
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceStats {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(FRAME_TIME_WINDOW),
            avg_processing_time: Duration::ZERO,
            fps_counter: 0,
            last_fps_time: Instant::now(),
            fps: 0.0,
        }
    }

    pub fn record(&mut self, frame_time: Duration) {
        self.record_at(frame_time, Instant::now());
    }

    /// Record a frame time observed at `now`.
    pub fn record_at(&mut self, frame_time: Duration, now: Instant) {
        if self.frame_times.len() == FRAME_TIME_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        let total: Duration = self.frame_times.iter().sum();
        self.avg_processing_time = total / self.frame_times.len() as u32;

        self.fps_counter += 1;
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.fps_counter as f64 / elapsed.as_secs_f64();
            self.fps_counter = 0;
            self.last_fps_time = now;
        }
    }

    pub fn avg_processing_time(&self) -> Duration {
        self.avg_processing_time
    }

    /// Frames per second over the last completed one-second window.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn samples(&self) -> usize {
        self.frame_times.len()
    }
}
