//! Detector that replays recorded per-frame detections.
//!
//! Pairs with a frame source through a shared [`FrameCursor`] so each call
//! answers for the frame the source handed out last.

use crate::detector::Detector;
use crate::source::FrameCursor;
use contour_core::{BoundingBox, DetectionResult};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read detections {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid detections file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One recorded frame. A missing or null `detection` means no face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub frame: usize,
    #[serde(default)]
    pub detection: Option<DetectionResult>,
}

pub struct ReplayDetector {
    records: HashMap<usize, DetectionResult>,
    cursor: FrameCursor,
}

impl ReplayDetector {
    pub fn new(records: Vec<ReplayRecord>, cursor: FrameCursor) -> Self {
        let records = records
            .into_iter()
            .filter_map(|r| {
                // Regions are derived data; rebuild them from the landmarks.
                let d = r.detection?;
                Some((r.frame, DetectionResult::new(d.bbox, d.confidence, d.landmarks)))
            })
            .collect();
        Self { records, cursor }
    }

    pub fn load(path: impl AsRef<Path>, cursor: FrameCursor) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let detector = Self::from_json_str(&text, cursor)?;
        tracing::info!(path = %path.display(), faces = detector.len(), "loaded recorded detections");
        Ok(detector)
    }

    pub fn from_json_str(text: &str, cursor: FrameCursor) -> Result<Self, ReplayError> {
        let records: Vec<ReplayRecord> = serde_json::from_str(text)?;
        Ok(Self::new(records, cursor))
    }

    /// Number of frames with a recorded face.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn current(&self) -> Option<&DetectionResult> {
        self.records.get(&self.cursor.current()?)
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, _image: &RgbImage) -> Option<DetectionResult> {
        self.current().cloned()
    }

    fn detect_in_region(&mut self, _image: &RgbImage, roi: &BoundingBox) -> Option<DetectionResult> {
        let face = self.current()?;
        if !roi.contains_box(&face.bbox) {
            return None;
        }
        Some(face.translated(-roi.x, -roi.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FrameSource, VecFrameSource};

    const RECORDING: &str = r#"[
        {"frame": 0, "detection": {
            "bbox": {"x": 40, "y": 30, "width": 50, "height": 50},
            "confidence": 0.92,
            "landmarks": [{"x": 65.0, "y": 55.0}]
        }},
        {"frame": 1, "detection": null},
        {"frame": 2}
    ]"#;

    #[test]
    fn test_follows_source_cursor() {
        let mut source = VecFrameSource::new(vec![RgbImage::new(160, 120); 3]);
        let mut det = ReplayDetector::from_json_str(RECORDING, source.cursor()).unwrap();
        assert_eq!(det.len(), 1);

        let img = RgbImage::new(160, 120);
        assert!(det.detect(&img).is_none(), "no frame read yet");

        source.next_frame().unwrap();
        let d = det.detect(&img).unwrap();
        assert_eq!(d.bbox, BoundingBox::new(40, 30, 50, 50));
        assert_eq!(d.landmarks[0].z, 0.0);

        source.next_frame().unwrap();
        assert!(det.detect(&img).is_none());
    }

    #[test]
    fn test_region_detection_is_roi_relative() {
        let mut source = VecFrameSource::new(vec![RgbImage::new(160, 120)]);
        let mut det = ReplayDetector::from_json_str(RECORDING, source.cursor()).unwrap();
        source.next_frame().unwrap();
        let img = RgbImage::new(160, 120);

        let d = det
            .detect_in_region(&img, &BoundingBox::new(30, 20, 80, 80))
            .unwrap();
        assert_eq!(d.bbox, BoundingBox::new(10, 10, 50, 50));
        assert!((d.landmarks[0].x - 35.0).abs() < 1e-9);

        // Face not inside the ROI.
        assert!(det
            .detect_in_region(&img, &BoundingBox::new(100, 0, 40, 40))
            .is_none());
    }

    #[test]
    fn test_bad_json() {
        let err = ReplayDetector::from_json_str("{not json", FrameCursor::new()).err().unwrap();
        assert!(matches!(err, ReplayError::Parse(_)));
    }
}
