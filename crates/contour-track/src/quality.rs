//! Tracking stability and per-frame quality scoring.

use contour_core::regions::is_face_centered;
use contour_core::{BoundingBox, DetectionResult};

/// Number of most recent boxes examined for stability.
const STABILITY_WINDOW: usize = 3;

const STABILITY_BONUS: f64 = 0.1;
const CENTERED_BONUS: f64 = 0.1;
const SIZE_BONUS: f64 = 0.1;
/// Face area / frame area range that earns the size bonus.
const GOOD_FACE_RATIO: (f64, f64) = (0.1, 0.4);

/// Stable iff the last three box centers moved less than `threshold_px` on average.
pub fn is_tracking_stable(history: &[BoundingBox], threshold_px: f64) -> bool {
    if history.len() < STABILITY_WINDOW {
        return false;
    }
    let recent = &history[history.len() - STABILITY_WINDOW..];
    let total: f64 = recent
        .windows(2)
        .map(|pair| pair[0].center().distance_2d(&pair[1].center()))
        .sum();
    total / ((STABILITY_WINDOW - 1) as f64) < threshold_px
}

/// Quality in [0, 1]: detector confidence plus bonuses for stability,
/// centering and a reasonable face size.
pub fn tracking_quality(
    detection: Option<&DetectionResult>,
    stable_enough: bool,
    frame_width: u32,
    frame_height: u32,
) -> f64 {
    let Some(d) = detection.filter(|d| d.is_valid()) else {
        return 0.0;
    };

    let mut score = d.confidence;
    if stable_enough {
        score += STABILITY_BONUS;
    }
    if is_face_centered(&d.bbox, frame_width, frame_height) {
        score += CENTERED_BONUS;
    }

    let frame_area = frame_width as f64 * frame_height as f64;
    if frame_area > 0.0 {
        let ratio = d.bbox.area() / frame_area;
        if (GOOD_FACE_RATIO.0..=GOOD_FACE_RATIO.1).contains(&ratio) {
            score += SIZE_BONUS;
        }
    }

    score.clamp(0.0, 1.0)
}
