//! Adaptive frame-by-frame tracking scheduler.
//!
//! Pull-based: each call to `next()` reads one frame, decides between a
//! full-frame pass, an ROI re-detection or extrapolation, updates tracking
//! state, adapts the skip schedule and optionally paces. Nothing runs in the
//! background; the only blocking points are the source, the detector and the
//! pacing sleep.

use crate::config::{TrackerConfig, TrackingParams};
use crate::detector::Detector;
use crate::quality::tracking_quality;
use crate::roi::{self, SearchArea};
use crate::source::FrameSource;
use crate::state::{AdaptiveScheduleConfig, PerformanceStats, TrackingState};
use contour_core::{BoundingBox, DetectionResult};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// --- Extrapolation ---
/// Fraction of the last observed velocity applied when predicting the next box.
const VELOCITY_WEIGHT: f64 = 0.5;
/// Confidence lost per frame since the last real detection.
const EXTRAPOLATION_DECAY: f64 = 0.05;
const EXTRAPOLATION_FLOOR: f64 = 0.3;

/// Slow frames stretch the skip interval by this factor.
const SLOW_SKIP_FACTOR: f64 = 1.5;

/// How the detection on a frame was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrategy {
    /// Full-frame detector pass.
    Full,
    /// Re-detection inside an ROI around the last face.
    Roi,
    /// No detector call; previous face carried forward.
    Extrapolated,
    /// Recovery search after sustained loss.
    Recovery,
}

impl DetectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Roi => "roi",
            Self::Extrapolated => "extrapolated",
            Self::Recovery => "recovery",
        }
    }
}

/// One frame with its detection and tracking metadata.
#[derive(Debug, Clone)]
pub struct TrackedFrame {
    pub frame: RgbImage,
    pub detection: Option<DetectionResult>,
    pub tracking_quality: f64,
    pub is_stable: bool,
    pub frame_number: u64,
    pub tracking_confidence: f64,
    pub is_tracking: bool,
    pub lost_frames: u32,
    pub skip_frames_used: u32,
    /// Time since the session started.
    pub timestamp: Duration,
    pub strategy: DetectionStrategy,
}

impl TrackedFrame {
    pub fn has_face(&self) -> bool {
        self.detection.as_ref().is_some_and(|d| d.is_valid())
    }
}

/// Track faces across `source` using `schedule` and default tracking params.
pub fn track_faces<S: FrameSource, D: Detector>(
    source: S,
    detector: D,
    schedule: AdaptiveScheduleConfig,
) -> TrackingScheduler<S, D> {
    TrackingScheduler::new(
        source,
        detector,
        TrackerConfig {
            schedule,
            tracking: TrackingParams::default(),
        },
    )
}

/// How long to sleep after a frame, if at all.
///
/// Only paces while tracking steadily, sleeping off half the remaining budget.
pub fn pacing_delay(elapsed: Duration, target: Duration, state: &TrackingState, enabled: bool) -> Option<Duration> {
    if !enabled || !state.is_tracking || state.lost_frames > 0 || elapsed >= target {
        return None;
    }
    Some((target - elapsed) / 2)
}

/// Iterator of [`TrackedFrame`]s driven by a frame source and a detector.
///
/// Owns all of its session state; run independent sessions on separate
/// schedulers.
pub struct TrackingScheduler<S, D> {
    source: S,
    detector: D,
    schedule: AdaptiveScheduleConfig,
    params: TrackingParams,
    state: TrackingState,
    stats: PerformanceStats,
    last_detection: Option<DetectionResult>,
    skip_counter: u32,
    frame_count: u64,
    started: Instant,
    finished: bool,
}

impl<S: FrameSource, D: Detector> TrackingScheduler<S, D> {
    pub fn new(source: S, detector: D, config: TrackerConfig) -> Self {
        let config = config.validated();
        tracing::debug!(
            base_skip = config.schedule.base_skip,
            max_skip = config.schedule.max_skip,
            max_lost_frames = config.tracking.max_lost_frames,
            pacing = config.tracking.pacing,
            "tracking session started"
        );
        Self {
            source,
            detector,
            schedule: config.schedule,
            params: config.tracking,
            state: TrackingState::default(),
            stats: PerformanceStats::new(),
            last_detection: None,
            skip_counter: 0,
            frame_count: 0,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn schedule(&self) -> &AdaptiveScheduleConfig {
        &self.schedule
    }

    pub fn stats(&self) -> &PerformanceStats {
        &self.stats
    }

    pub fn params(&self) -> &TrackingParams {
        &self.params
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Read the next frame, retrying transient empty reads while the source is active.
    fn pull_frame(&mut self) -> Option<RgbImage> {
        if self.finished {
            return None;
        }
        let mut empty_reads = 0u32;
        while self.source.is_active() {
            if let Some(frame) = self.source.next_frame() {
                return Some(frame);
            }
            empty_reads += 1;
            if empty_reads > self.params.max_empty_reads {
                tracing::warn!(empty_reads, "frame source stalled; ending session");
                break;
            }
        }
        tracing::debug!(frames = self.frame_count, "frame source exhausted");
        self.finished = true;
        None
    }

    fn should_detect(&self) -> bool {
        let skip = self.schedule.current_skip;
        if self.skip_counter >= skip || !self.state.is_tracking || self.state.lost_frames > 0 {
            return true;
        }
        if self.stats.avg_processing_time() > self.schedule.performance_threshold {
            return self.skip_counter as f64 >= skip as f64 * SLOW_SKIP_FACTOR;
        }
        if self.state.tracking_confidence < self.schedule.quality_threshold {
            return self.skip_counter >= (skip / 2).max(1);
        }
        false
    }

    /// Run the detector inside `roi`, translating a valid hit to frame coordinates.
    fn detect_in(&mut self, frame: &RgbImage, roi: &BoundingBox) -> Option<DetectionResult> {
        self.detector
            .detect_in_region(frame, roi)
            .filter(|d| d.is_valid())
            .map(|d| d.translated(roi.x, roi.y))
    }

    /// ROI re-detection while tracking, full frame otherwise or on an ROI miss.
    fn detect(&mut self, frame: &RgbImage) -> (Option<DetectionResult>, DetectionStrategy) {
        let (width, height) = frame.dimensions();
        if let (true, Some(last)) = (self.state.is_tracking, self.state.last_bbox) {
            match roi::detection_area(&last, self.params.roi_expansion, width, height) {
                SearchArea::Region(area) => {
                    if let Some(d) = self.detect_in(frame, &area) {
                        return (Some(d), DetectionStrategy::Roi);
                    }
                    tracing::trace!(frame = self.frame_count, "ROI miss; retrying full frame");
                }
                SearchArea::FullFrame => {
                    tracing::trace!(frame = self.frame_count, "ROI covers most of the frame; using full frame");
                }
            }
        }
        (self.detector.detect(frame), DetectionStrategy::Full)
    }

    /// Carry the last face forward along its recent velocity.
    fn extrapolate(&self) -> Option<DetectionResult> {
        let last = self.last_detection.as_ref()?;
        if !self.state.is_tracking {
            return None;
        }

        let since = self
            .state
            .last_successful_frame
            .map(|f| self.frame_count.saturating_sub(f))
            .unwrap_or(0);
        let confidence = (last.confidence - since as f64 * EXTRAPOLATION_DECAY)
            .max(EXTRAPOLATION_FLOOR)
            .clamp(0.0, 1.0);

        let bbox = match self.state.bbox_history.last_two() {
            Some((prev, curr)) => {
                let (p, c) = (prev.center(), curr.center());
                BoundingBox::new(
                    (curr.x as f64 + (c.x - p.x) * VELOCITY_WEIGHT) as i32,
                    (curr.y as f64 + (c.y - p.y) * VELOCITY_WEIGHT) as i32,
                    curr.width,
                    curr.height,
                )
            }
            None => last.bbox,
        };

        Some(DetectionResult {
            bbox,
            confidence,
            landmarks: last.landmarks.clone(),
            regions: last.regions.clone(),
        })
    }

    /// Search harder after sustained loss.
    fn recover(&mut self, frame: &RgbImage) -> Option<DetectionResult> {
        if self.state.lost_frames > self.params.max_lost_frames {
            return self.detector.detect(frame);
        }

        let (width, height) = frame.dimensions();
        let has_last = self.last_detection.is_some();
        if let (true, Some(last)) = (has_last, self.state.last_bbox) {
            let expansion = self.state.search_region_expansion;
            match roi::recovery_area(&last, expansion, width, height) {
                SearchArea::FullFrame => return self.detector.detect(frame),
                SearchArea::Region(area) => {
                    if let Some(d) = self.detect_in(frame, &area) {
                        return Some(d);
                    }
                }
            }
        }
        self.detector.detect(frame)
    }

    fn remember(&mut self, detection: &Option<DetectionResult>) {
        if let Some(d) = detection.as_ref().filter(|d| d.is_valid()) {
            self.last_detection = Some(d.clone());
        }
    }
}

impl<S: FrameSource, D: Detector> Iterator for TrackingScheduler<S, D> {
    type Item = TrackedFrame;

    fn next(&mut self) -> Option<TrackedFrame> {
        let frame = self.pull_frame()?;
        let frame_start = Instant::now();
        let timestamp = self.started.elapsed();
        let frame_number = self.frame_count;
        let (width, height) = frame.dimensions();
        let was_tracking = self.state.is_tracking;

        let (mut detection, mut strategy) = if self.should_detect() {
            self.skip_counter = 0;
            let (detection, strategy) = self.detect(&frame);
            self.state.update(detection.as_ref(), frame_number, &self.params);
            self.remember(&detection);
            (detection, strategy)
        } else {
            self.skip_counter += 1;
            (self.extrapolate(), DetectionStrategy::Extrapolated)
        };

        if self.state.needs_recovery(&self.params) {
            let recovered = self.recover(&frame);
            if recovered.as_ref().is_some_and(|d| d.is_valid()) {
                tracing::debug!(frame = frame_number, lost = self.state.lost_frames, "face recovered");
                self.state.update(recovered.as_ref(), frame_number, &self.params);
                self.remember(&recovered);
            }
            detection = recovered;
            strategy = DetectionStrategy::Recovery;
        }

        match (was_tracking, self.state.is_tracking) {
            (false, true) => tracing::info!(frame = frame_number, "face acquired"),
            (true, false) => tracing::info!(
                frame = frame_number,
                lost = self.state.lost_frames,
                "tracking lost; searching"
            ),
            _ => {}
        }

        let quality = tracking_quality(
            detection.as_ref(),
            self.state.stability_counter >= self.params.min_stability_frames,
            width,
            height,
        );

        let previous_skip = self.schedule.current_skip;
        if self.schedule.adapt(quality, self.stats.avg_processing_time()) {
            tracing::info!(
                from = previous_skip,
                to = self.schedule.current_skip,
                avg_ms = self.stats.avg_processing_time().as_secs_f64() * 1000.0,
                quality,
                "frame skip adjusted"
            );
        }

        let tracked = TrackedFrame {
            frame,
            detection,
            tracking_quality: quality,
            is_stable: self.state.is_stable(&self.params),
            frame_number,
            tracking_confidence: self.state.tracking_confidence,
            is_tracking: self.state.is_tracking,
            lost_frames: self.state.lost_frames,
            skip_frames_used: self.schedule.current_skip,
            timestamp,
            strategy,
        };

        tracing::debug!(
            frame = frame_number,
            strategy = strategy.as_str(),
            quality,
            tracking = tracked.is_tracking,
            lost = tracked.lost_frames,
            "frame processed"
        );

        self.frame_count += 1;
        let elapsed = frame_start.elapsed();
        self.stats.record(elapsed);
        if let Some(delay) = pacing_delay(elapsed, self.params.target_frame_time, &self.state, self.params.pacing) {
            std::thread::sleep(delay);
        }

        Some(tracked)
    }
}
