//! Face detector capability consumed by the scheduler.

use crate::roi;
use contour_core::{BoundingBox, DetectionResult};
use image::RgbImage;

/// A landmark detector: image in, at most one face out.
///
/// Implementations may block; the scheduler calls them synchronously and
/// treats `None` as "no face".
pub trait Detector {
    /// Detect a face anywhere in `image`, in image coordinates.
    fn detect(&mut self, image: &RgbImage) -> Option<DetectionResult>;

    /// Detect a face inside `roi` (given in full-image coordinates).
    ///
    /// The result is relative to the ROI origin; the caller translates it
    /// back. The default crops the image and runs [`Detector::detect`].
    fn detect_in_region(&mut self, image: &RgbImage, roi: &BoundingBox) -> Option<DetectionResult> {
        let crop = roi::crop(image, roi)?;
        self.detect(&crop)
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, image: &RgbImage) -> Option<DetectionResult> {
        (**self).detect(image)
    }

    fn detect_in_region(&mut self, image: &RgbImage, roi: &BoundingBox) -> Option<DetectionResult> {
        (**self).detect_in_region(image, roi)
    }
}

impl<D: Detector + ?Sized> Detector for &mut D {
    fn detect(&mut self, image: &RgbImage) -> Option<DetectionResult> {
        (**self).detect(image)
    }

    fn detect_in_region(&mut self, image: &RgbImage, roi: &BoundingBox) -> Option<DetectionResult> {
        (**self).detect_in_region(image, roi)
    }
}
