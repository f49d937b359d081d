//! Surgery orchestration.
//!
//! Sequences per-feature warps onto one working image in a fixed order
//! (nose, eyes, cheekbones, jawline) and scores the result by how much was
//! asked for rather than by re-measuring pixels.

use crate::adjust::{CheekboneConfig, EyeConfig, JawlineConfig, NoseConfig, SurgeryConfig, NEGLIGIBLE_ADJUSTMENT};
use crate::features::{
    control_map, FeatureControlMap, FeatureType, LEFT_CHEEK, LEFT_EYE_CORNERS, LEFT_NOSTRIL,
    RIGHT_CHEEK, RIGHT_EYE_CORNERS, RIGHT_NOSTRIL,
};
use crate::types::{Point3D, FACE_MESH_LANDMARKS};
use crate::warp::{apply_displacement_with, validate_transformation, warp_image, FeatureModification};
use image::RgbImage;
use std::time::{Duration, Instant};

/// Default score at or above which a result counts as natural.
pub const DEFAULT_NATURAL_THRESHOLD: f64 = 0.7;

// --- Proportion bounds, as fractions of face width ---
const EYE_DISTANCE_RATIO: (f64, f64) = (0.15, 0.25);
const NOSE_WIDTH_RATIO: (f64, f64) = (0.08, 0.15);

/// Average landmark movement (pixels) at which the distance score reaches zero.
const DISTANCE_SCORE_SCALE: f64 = 10.0;

/// Outcome of a full surgery run.
#[derive(Debug, Clone)]
pub struct SurgeryResult {
    pub image: RgbImage,
    /// Landmarks after every applied feature, chained in application order.
    pub modified_landmarks: Vec<Point3D>,
    pub applied_features: Vec<String>,
    pub natural_score: f64,
    pub processing_time: Duration,
}

impl SurgeryResult {
    pub fn is_natural(&self, threshold: f64) -> bool {
        self.natural_score >= threshold
    }

    pub fn is_successful(&self) -> bool {
        !self.applied_features.is_empty() && !self.modified_landmarks.is_empty()
    }
}

/// A single feature's warped image and landmarks.
#[derive(Debug, Clone)]
pub struct FeatureWarp {
    pub image: RgbImage,
    pub landmarks: Vec<Point3D>,
}

/// Map an aggregate intensity in [0, 1] onto a coarse naturalness band.
pub fn natural_score_from_intensity(intensity: f64) -> f64 {
    if !intensity.is_finite() {
        return 0.3;
    }
    if intensity <= 0.3 {
        0.9
    } else if intensity <= 0.6 {
        0.7
    } else if intensity <= 0.8 {
        0.5
    } else {
        0.3
    }
}

/// `1 - avg/10`, clamped to [0, 1]; zero when the sets don't line up.
pub fn natural_score_from_distance(original: &[Point3D], modified: &[Point3D]) -> f64 {
    if original.len() != modified.len() || original.is_empty() {
        return 0.0;
    }
    let v = validate_transformation(original, modified);
    (1.0 - v.avg_distance / DISTANCE_SCORE_SCALE).clamp(0.0, 1.0)
}

fn eye_center(landmarks: &[Point3D], corners: [usize; 2]) -> Point3D {
    let a = landmarks[corners[0]];
    let b = landmarks[corners[1]];
    Point3D::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, (a.z + b.z) / 2.0)
}

/// Whether eye spacing and nose width sit in plausible proportion to face width.
pub fn validate_proportions(landmarks: &[Point3D]) -> bool {
    if landmarks.len() != FACE_MESH_LANDMARKS {
        return false;
    }

    let face_width = (landmarks[RIGHT_CHEEK[0]].x - landmarks[LEFT_CHEEK[0]].x).abs();
    if face_width <= 0.0 {
        return true;
    }

    let left = eye_center(landmarks, LEFT_EYE_CORNERS);
    let right = eye_center(landmarks, RIGHT_EYE_CORNERS);
    // Horizontal spacing only.
    let eye_ratio = (right.x - left.x).abs() / face_width;
    if !(EYE_DISTANCE_RATIO.0..=EYE_DISTANCE_RATIO.1).contains(&eye_ratio) {
        return false;
    }

    let nose_width = (landmarks[RIGHT_NOSTRIL[0]].x - landmarks[LEFT_NOSTRIL[0]].x).abs();
    if nose_width > 0.0 {
        let nose_ratio = nose_width / face_width;
        if !(NOSE_WIDTH_RATIO.0..=NOSE_WIDTH_RATIO.1).contains(&nose_ratio) {
            return false;
        }
    }
    true
}

/// Applies feature modifications against a shared control map.
#[derive(Debug, Clone, Copy)]
pub struct SurgeryEngine {
    map: &'static FeatureControlMap,
}

impl Default for SurgeryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SurgeryEngine {
    pub fn new() -> Self {
        Self { map: control_map() }
    }

    pub fn with_map(map: &'static FeatureControlMap) -> Self {
        Self { map }
    }

    pub fn control_map(&self) -> &'static FeatureControlMap {
        self.map
    }

    /// Validate the adjusted landmarks and warp, or `None` if nothing should change.
    fn commit(
        &self,
        feature: FeatureType,
        image: &RgbImage,
        original: &[Point3D],
        modified: Vec<Point3D>,
    ) -> Option<FeatureWarp> {
        if modified.as_slice() == original {
            return None;
        }
        let validation = validate_transformation(original, &modified);
        if !validation.valid {
            tracing::debug!(
                feature = %feature,
                max_distance = validation.max_distance,
                "feature rejected: displacement too large"
            );
            return None;
        }
        tracing::debug!(
            feature = %feature,
            avg_distance = validation.avg_distance,
            natural = validation.natural,
            "applying feature"
        );
        Some(FeatureWarp {
            image: warp_image(image, original, &modified),
            landmarks: modified,
        })
    }

    pub fn modify_nose(&self, image: &RgbImage, landmarks: &[Point3D], config: &NoseConfig) -> Option<FeatureWarp> {
        if landmarks.len() != FACE_MESH_LANDMARKS || !config.has_modifications() {
            return None;
        }
        self.commit(FeatureType::Nose, image, landmarks, config.apply(landmarks))
    }

    pub fn modify_eyes(&self, image: &RgbImage, landmarks: &[Point3D], config: &EyeConfig) -> Option<FeatureWarp> {
        if landmarks.len() != FACE_MESH_LANDMARKS || !config.has_modifications() {
            return None;
        }
        self.commit(FeatureType::Eyes, image, landmarks, config.apply(landmarks))
    }

    pub fn modify_jawline(
        &self,
        image: &RgbImage,
        landmarks: &[Point3D],
        config: &JawlineConfig,
    ) -> Option<FeatureWarp> {
        if landmarks.len() != FACE_MESH_LANDMARKS || !config.has_modifications() {
            return None;
        }
        self.commit(FeatureType::Jawline, image, landmarks, config.apply(landmarks))
    }

    pub fn modify_cheekbones(
        &self,
        image: &RgbImage,
        landmarks: &[Point3D],
        config: &CheekboneConfig,
    ) -> Option<FeatureWarp> {
        if landmarks.len() != FACE_MESH_LANDMARKS || !config.has_modifications() {
            return None;
        }
        self.commit(FeatureType::Cheekbones, image, landmarks, config.apply(landmarks))
    }

    /// Run every active sub-adjustment in `config`.
    pub fn apply_config(&self, image: &RgbImage, landmarks: &[Point3D], config: &SurgeryConfig) -> SurgeryResult {
        let start = Instant::now();
        let mut working = image.clone();
        let mut current = landmarks.to_vec();
        let mut applied = Vec::new();

        for feature in FeatureType::ALL {
            let step = match feature {
                FeatureType::Nose => self.modify_nose(&working, &current, &config.nose),
                FeatureType::Eyes => self.modify_eyes(&working, &current, &config.eyes),
                FeatureType::Cheekbones => self.modify_cheekbones(&working, &current, &config.cheekbones),
                FeatureType::Jawline => self.modify_jawline(&working, &current, &config.jawline),
            };
            if let Some(step) = step {
                working = step.image;
                current = step.landmarks;
                applied.push(feature.to_string());
            }
        }

        let result = SurgeryResult {
            image: working,
            modified_landmarks: current,
            applied_features: applied,
            natural_score: natural_score_from_intensity(config.total_intensity()),
            processing_time: start.elapsed(),
        };
        tracing::debug!(
            applied = ?result.applied_features,
            natural_score = result.natural_score,
            elapsed_ms = result.processing_time.as_millis() as u64,
            "surgery complete"
        );
        result
    }

    /// Apply displacement modifications feature by feature.
    ///
    /// Modifications are grouped by feature and applied in the fixed feature
    /// order; within a feature they keep the order given. Negligible ones are
    /// skipped, as are those beyond their natural limit or past the hard
    /// displacement ceiling.
    pub fn apply_full_surgery(
        &self,
        image: &RgbImage,
        landmarks: &[Point3D],
        modifications: &[FeatureModification],
    ) -> SurgeryResult {
        let start = Instant::now();
        let mut working = image.clone();
        let mut current = landmarks.to_vec();
        let mut applied: Vec<String> = Vec::new();

        let requested: Vec<&FeatureModification> = modifications
            .iter()
            .filter(|m| m.magnitude() >= NEGLIGIBLE_ADJUSTMENT)
            .collect();

        if landmarks.len() == FACE_MESH_LANDMARKS {
            for feature in FeatureType::ALL {
                for m in requested.iter().filter(|m| m.feature_type == feature) {
                    let modified = apply_displacement_with(self.map, &current, m);
                    if let Some(step) = self.commit(feature, &working, &current, modified) {
                        working = step.image;
                        current = step.landmarks;
                        let name = feature.to_string();
                        if !applied.contains(&name) {
                            applied.push(name);
                        }
                    }
                }
            }
        }

        let aggregate = requested.iter().map(|m| m.intensity).sum::<f64>() / FeatureType::ALL.len() as f64;
        SurgeryResult {
            image: working,
            modified_landmarks: current,
            applied_features: applied,
            natural_score: natural_score_from_intensity(aggregate),
            processing_time: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3D;
    use image::Rgb;

    fn mesh() -> Vec<Point3D> {
        (0..FACE_MESH_LANDMARKS)
            .map(|i| Point3D::new(40.0 + (i % 22) as f64 * 6.0, 30.0 + (i / 22) as f64 * 6.0, 0.0))
            .collect()
    }

    fn image() -> RgbImage {
        RgbImage::from_fn(200, 200, |x, y| Rgb([x as u8, y as u8, 64]))
    }

    #[test]
    fn test_intensity_bands() {
        assert_eq!(natural_score_from_intensity(0.0), 0.9);
        assert_eq!(natural_score_from_intensity(0.3), 0.9);
        assert_eq!(natural_score_from_intensity(0.5), 0.7);
        assert_eq!(natural_score_from_intensity(0.75), 0.5);
        assert_eq!(natural_score_from_intensity(0.95), 0.3);
    }

    #[test]
    fn test_distance_score() {
        let base = mesh();
        assert_eq!(natural_score_from_distance(&base, &base), 1.0);
        let moved: Vec<Point3D> = base.iter().map(|p| p.translated(5.0, 0.0)).collect();
        assert!((natural_score_from_distance(&base, &moved) - 0.5).abs() < 1e-9);
        let far: Vec<Point3D> = base.iter().map(|p| p.translated(50.0, 0.0)).collect();
        assert_eq!(natural_score_from_distance(&base, &far), 0.0);
        assert_eq!(natural_score_from_distance(&base, &base[..3]), 0.0);
    }

    #[test]
    fn test_apply_config_order_and_chaining() {
        let engine = SurgeryEngine::new();
        let base = mesh();
        let config = SurgeryConfig {
            nose: NoseConfig {
                height: 0.4,
                ..Default::default()
            },
            jawline: JawlineConfig {
                width: 0.3,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = engine.apply_config(&image(), &base, &config);
        assert_eq!(result.applied_features, vec!["nose", "jawline"]);
        assert_ne!(result.modified_landmarks, base);
        assert!(result.is_successful());
        // total intensity 0.7 / 8 lands in the top band.
        assert_eq!(result.natural_score, 0.9);
        assert!(result.is_natural(DEFAULT_NATURAL_THRESHOLD));
    }

    #[test]
    fn test_apply_config_noop() {
        let engine = SurgeryEngine::default();
        let img = image();
        let result = engine.apply_config(&img, &mesh(), &SurgeryConfig::default());
        assert!(result.applied_features.is_empty());
        assert!(!result.is_successful());
        assert_eq!(result.image, img);
    }

    #[test]
    fn test_wrong_landmark_count_leaves_image_identical() {
        let engine = SurgeryEngine::new();
        let img = image();
        let short: Vec<Point3D> = mesh().into_iter().take(200).collect();
        let m = FeatureModification::new(FeatureType::Nose, Vector3D::new(3.0, 0.0, 0.0), 0.5, 1.0).unwrap();
        let result = engine.apply_full_surgery(&img, &short, &[m]);
        assert_eq!(result.image, img);
        assert_eq!(result.modified_landmarks, short);
        assert!(result.applied_features.is_empty());
    }

    #[test]
    fn test_full_surgery_skips_negligible_and_over_limit() {
        let engine = SurgeryEngine::new();
        let base = mesh();
        let mods = [
            FeatureModification::new(FeatureType::Jawline, Vector3D::new(4.0, 0.0, 0.0), 0.5, 1.0).unwrap(),
            FeatureModification::new(FeatureType::Nose, Vector3D::new(0.001, 0.0, 0.0), 0.5, 1.0).unwrap(),
            FeatureModification::new(FeatureType::Eyes, Vector3D::new(4.0, 0.0, 0.0), 0.9, 0.2).unwrap(),
            FeatureModification::new(FeatureType::Cheekbones, Vector3D::new(0.0, -4.0, 0.0), 0.5, 1.0).unwrap(),
        ];
        let result = engine.apply_full_surgery(&image(), &base, &mods);
        assert_eq!(result.applied_features, vec!["cheekbones", "jawline"]);
        let jaw = control_map().indices(FeatureType::Jawline)[0];
        assert!((result.modified_landmarks[jaw].x - base[jaw].x - 2.0).abs() < 1e-9);
        // (0.5 + 0.9 + 0.5) / 4 = 0.475
        assert_eq!(result.natural_score, 0.7);
    }

    #[test]
    fn test_validate_proportions() {
        let mut lm = vec![Point3D::default(); FACE_MESH_LANDMARKS];
        lm[LEFT_CHEEK[0]] = Point3D::new(0.0, 100.0, 0.0);
        lm[RIGHT_CHEEK[0]] = Point3D::new(200.0, 100.0, 0.0);
        lm[LEFT_EYE_CORNERS[0]] = Point3D::new(70.0, 80.0, 0.0);
        lm[LEFT_EYE_CORNERS[1]] = Point3D::new(80.0, 80.0, 0.0);
        lm[RIGHT_EYE_CORNERS[0]] = Point3D::new(110.0, 80.0, 0.0);
        lm[RIGHT_EYE_CORNERS[1]] = Point3D::new(120.0, 80.0, 0.0);
        lm[LEFT_NOSTRIL[0]] = Point3D::new(85.0, 120.0, 0.0);
        lm[RIGHT_NOSTRIL[0]] = Point3D::new(105.0, 120.0, 0.0);
        // eyes 40 / 200 = 0.2, nose 20 / 200 = 0.1
        assert!(validate_proportions(&lm));

        lm[RIGHT_NOSTRIL[0]] = Point3D::new(145.0, 120.0, 0.0);
        assert!(!validate_proportions(&lm));
        assert!(!validate_proportions(&lm[..100]));
    }

    #[test]
    fn test_eye_spacing_is_horizontal() {
        let mut lm = vec![Point3D::default(); FACE_MESH_LANDMARKS];
        lm[LEFT_CHEEK[0]] = Point3D::new(0.0, 100.0, 0.0);
        lm[RIGHT_CHEEK[0]] = Point3D::new(200.0, 100.0, 0.0);
        lm[LEFT_EYE_CORNERS[0]] = Point3D::new(70.0, 80.0, 0.0);
        lm[LEFT_EYE_CORNERS[1]] = Point3D::new(80.0, 80.0, 0.0);
        // Right eye 60 px lower: 72 px apart in 2D, 40 px horizontally.
        lm[RIGHT_EYE_CORNERS[0]] = Point3D::new(110.0, 140.0, 0.0);
        lm[RIGHT_EYE_CORNERS[1]] = Point3D::new(120.0, 140.0, 0.0);
        lm[LEFT_NOSTRIL[0]] = Point3D::new(85.0, 120.0, 0.0);
        lm[RIGHT_NOSTRIL[0]] = Point3D::new(105.0, 120.0, 0.0);
        assert!(validate_proportions(&lm));
    }
}
