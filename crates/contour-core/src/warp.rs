//! Landmark-driven image warping.
//!
//! Turns a sparse set of landmark displacements into a dense deformation with
//! a thin plate spline and resamples the image through it. Every failure path
//! returns the input image unchanged.

use crate::adjust;
use crate::features::{control_map, FeatureControlMap, FeatureType};
use crate::tps::{TpsModel, MIN_CONTROL_POINTS};
use crate::types::{Point3D, Vector3D, FACE_MESH_LANDMARKS};
use image::RgbImage;
use thiserror::Error;

/// A landmark must move at least this far (pixels) to become a control point.
pub const MIN_CONTROL_DISPLACEMENT: f64 = 1.0;
/// Any landmark moving this far (pixels) or more marks the warp invalid.
pub const EXTREME_DISPLACEMENT: f64 = 50.0;
/// Average landmark movement (pixels) below which a warp reads as natural.
pub const NATURAL_DISPLACEMENT: f64 = 20.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModificationError {
    #[error("intensity must be within [0, 1], got {0}")]
    IntensityOutOfRange(f64),
    #[error("natural limit must be within [0, 1], got {0}")]
    NaturalLimitOutOfRange(f64),
}

/// A requested displacement of one feature's control points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureModification {
    pub feature_type: FeatureType,
    pub vector: Vector3D,
    pub intensity: f64,
    pub natural_limit: f64,
}

impl FeatureModification {
    pub fn new(
        feature_type: FeatureType,
        vector: Vector3D,
        intensity: f64,
        natural_limit: f64,
    ) -> Result<Self, ModificationError> {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(ModificationError::IntensityOutOfRange(intensity));
        }
        if !(0.0..=1.0).contains(&natural_limit) {
            return Err(ModificationError::NaturalLimitOutOfRange(natural_limit));
        }
        Ok(Self {
            feature_type,
            vector,
            intensity,
            natural_limit,
        })
    }

    pub fn is_within_natural_limit(&self) -> bool {
        self.intensity <= self.natural_limit
    }

    /// Displacement applied to each control point before limit clamping.
    pub fn displacement(&self) -> Vector3D {
        self.vector.scale(self.intensity)
    }

    /// Magnitude used to decide whether the modification is negligible.
    pub fn magnitude(&self) -> f64 {
        self.displacement().magnitude()
    }
}

/// Statistics comparing a landmark set before and after modification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformValidation {
    /// No landmark moved `EXTREME_DISPLACEMENT` pixels or more.
    pub valid: bool,
    /// Average movement stays below `NATURAL_DISPLACEMENT` pixels.
    pub natural: bool,
    pub avg_distance: f64,
    pub max_distance: f64,
    /// Landmarks that moved more than one pixel.
    pub affected_points: usize,
}

/// Displace a feature's control points using the shared control map.
pub fn apply_displacement(landmarks: &[Point3D], modification: &FeatureModification) -> Vec<Point3D> {
    apply_displacement_with(control_map(), landmarks, modification)
}

/// Displace a feature's control points by `vector * intensity`.
///
/// Nothing moves when the modification exceeds its natural limit or the
/// landmark set is not a complete mesh. The per-point displacement is capped
/// at the feature's natural pixel limit, keeping its direction.
pub fn apply_displacement_with(
    map: &FeatureControlMap,
    landmarks: &[Point3D],
    modification: &FeatureModification,
) -> Vec<Point3D> {
    let mut out = landmarks.to_vec();
    if landmarks.len() != FACE_MESH_LANDMARKS || !modification.is_within_natural_limit() {
        return out;
    }

    let mut delta = modification.displacement();
    let limit = map.natural_limit(modification.feature_type);
    let magnitude = delta.magnitude();
    if magnitude > limit && magnitude > 0.0 {
        delta = delta.scale(limit / magnitude);
    }

    for &i in map.indices(modification.feature_type) {
        if let Some(p) = out.get_mut(i) {
            *p = p.displaced(&delta, 1.0);
        }
    }
    out
}

/// Per-landmark movement statistics between two landmark sets.
pub fn validate_transformation(original: &[Point3D], modified: &[Point3D]) -> TransformValidation {
    if original.len() != modified.len() {
        return TransformValidation {
            valid: false,
            natural: false,
            avg_distance: 0.0,
            max_distance: 0.0,
            affected_points: 0,
        };
    }

    let distances: Vec<f64> = original
        .iter()
        .zip(modified)
        .map(|(a, b)| a.distance_2d(b))
        .collect();

    let (avg_distance, max_distance) = if distances.is_empty() {
        (0.0, 0.0)
    } else {
        (
            distances.iter().sum::<f64>() / distances.len() as f64,
            distances.iter().copied().fold(0.0, f64::max),
        )
    };

    TransformValidation {
        valid: max_distance < EXTREME_DISPLACEMENT,
        natural: avg_distance < NATURAL_DISPLACEMENT,
        avg_distance,
        max_distance,
        affected_points: distances.iter().filter(|&&d| d > 1.0).count(),
    }
}

/// Landmarks after the primary adjustment of `feature` by `amount` in [-1, 1].
///
/// Nose moves by height, eyes by size, jawline and cheekbones by width.
pub fn adjust_feature(landmarks: &[Point3D], feature: FeatureType, amount: f64) -> Vec<Point3D> {
    match feature {
        FeatureType::Nose => adjust::nose_height(landmarks, amount),
        FeatureType::Eyes => adjust::eye_size(landmarks, amount),
        FeatureType::Jawline => adjust::jaw_width(landmarks, amount),
        FeatureType::Cheekbones => adjust::cheek_width(landmarks, amount),
    }
}

/// Adjust one feature and warp the image to match.
pub fn warp_feature(image: &RgbImage, landmarks: &[Point3D], feature: FeatureType, amount: f64) -> RgbImage {
    if landmarks.len() != FACE_MESH_LANDMARKS {
        return image.clone();
    }
    let modified = adjust_feature(landmarks, feature, amount);
    let validation = validate_transformation(landmarks, &modified);
    if !validation.valid {
        tracing::debug!(
            feature = %feature,
            max_distance = validation.max_distance,
            "rejecting feature warp beyond extreme displacement"
        );
        return image.clone();
    }
    warp_image(image, landmarks, &modified)
}

/// Warp `image` so content at each original landmark lands on its modified position.
///
/// Uses a backward mapping: the spline is fitted from modified to original
/// points and every output pixel samples the source where it came from. The
/// four image corners are pinned as extra control points.
pub fn warp_image(image: &RgbImage, original: &[Point3D], modified: &[Point3D]) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0
        || height == 0
        || original.len() != FACE_MESH_LANDMARKS
        || modified.len() != FACE_MESH_LANDMARKS
    {
        return image.clone();
    }

    let mut src_control: Vec<[f64; 2]> = Vec::new();
    let mut dst_control: Vec<[f64; 2]> = Vec::new();
    for (o, m) in original.iter().zip(modified) {
        if o.distance_2d(m) >= MIN_CONTROL_DISPLACEMENT {
            src_control.push(o.to_2d());
            dst_control.push(m.to_2d());
        }
    }

    let moved = src_control.len();
    if moved < MIN_CONTROL_POINTS {
        return image.clone();
    }

    let w = (width - 1) as f64;
    let h = (height - 1) as f64;
    for anchor in [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]] {
        src_control.push(anchor);
        dst_control.push(anchor);
    }

    let model = match TpsModel::fit(&dst_control, &src_control) {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!(error = %e, moved, "TPS fit failed; returning image unchanged");
            return image.clone();
        }
    };

    tracing::debug!(moved, width, height, "TPS warp");

    let mut output = RgbImage::new(width, height);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let [sx, sy] = model.transform_point([x as f64, y as f64]);
        let (sx, sy) = if sx.is_finite() && sy.is_finite() {
            (sx, sy)
        } else {
            (x as f64, y as f64)
        };
        pixel.0 = sample_bilinear(image, sx, sy);
    }
    output
}

/// Mirror an out-of-range index back into `0..n`, repeating the edge pixel.
fn reflect(i: i64, n: i64) -> u32 {
    if n <= 1 {
        return 0;
    }
    let period = 2 * n;
    let mut m = i.rem_euclid(period);
    if m >= n {
        m = period - m - 1;
    }
    m as u32
}

/// Bilinear RGB sample with reflected borders.
fn sample_bilinear(image: &RgbImage, sx: f64, sy: f64) -> [u8; 3] {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);

    let fx0 = sx.floor();
    let fy0 = sy.floor();
    let fx = sx - fx0;
    let fy = sy - fy0;
    let x0 = fx0 as i64;
    let y0 = fy0 as i64;

    let tl = image.get_pixel(reflect(x0, w), reflect(y0, h)).0;
    let tr = image.get_pixel(reflect(x0 + 1, w), reflect(y0, h)).0;
    let bl = image.get_pixel(reflect(x0, w), reflect(y0 + 1, h)).0;
    let br = image.get_pixel(reflect(x0 + 1, w), reflect(y0 + 1, h)).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let val = tl[c] as f64 * (1.0 - fx) * (1.0 - fy)
            + tr[c] as f64 * fx * (1.0 - fy)
            + bl[c] as f64 * (1.0 - fx) * fy
            + br[c] as f64 * fx * fy;
        out[c] = val.round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// 468 landmarks spread over a 22 × 22 grid inside a 200 × 200 image.
    fn mesh() -> Vec<Point3D> {
        (0..FACE_MESH_LANDMARKS)
            .map(|i| Point3D::new(40.0 + (i % 22) as f64 * 6.0, 30.0 + (i / 22) as f64 * 6.0, 0.0))
            .collect()
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]))
    }

    fn modification(feature: FeatureType, intensity: f64, limit: f64) -> FeatureModification {
        FeatureModification::new(feature, Vector3D::new(4.0, -2.0, 0.0), intensity, limit).unwrap()
    }

    #[test]
    fn test_modification_rejects_out_of_range() {
        let v = Vector3D::new(1.0, 0.0, 0.0);
        assert_eq!(
            FeatureModification::new(FeatureType::Nose, v, 1.5, 0.5).unwrap_err(),
            ModificationError::IntensityOutOfRange(1.5)
        );
        assert!(FeatureModification::new(FeatureType::Nose, v, 0.5, -0.1).is_err());
        assert!(FeatureModification::new(FeatureType::Nose, v, f64::NAN, 0.5).is_err());
    }

    #[test]
    fn test_displacement_within_limit_moves_along_vector() {
        let base = mesh();
        let m = modification(FeatureType::Nose, 0.5, 0.8);
        let out = apply_displacement(&base, &m);
        for &i in control_map().indices(FeatureType::Nose) {
            assert!((out[i].x - base[i].x - 2.0).abs() < 1e-9);
            assert!((out[i].y - base[i].y + 1.0).abs() < 1e-9);
        }
        // Landmarks outside the feature are untouched.
        assert_eq!(out[10], base[10]);
    }

    #[test]
    fn test_displacement_beyond_limit_is_noop() {
        let base = mesh();
        let m = modification(FeatureType::Eyes, 0.9, 0.3);
        assert_eq!(apply_displacement(&base, &m), base);
    }

    #[test]
    fn test_displacement_capped_at_pixel_limit() {
        let base = mesh();
        let m = FeatureModification::new(FeatureType::Eyes, Vector3D::new(100.0, 0.0, 0.0), 1.0, 1.0)
            .unwrap();
        let out = apply_displacement(&base, &m);
        let i = control_map().indices(FeatureType::Eyes)[0];
        assert!((out[i].x - base[i].x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_displacement_incomplete_mesh() {
        let short: Vec<Point3D> = mesh().into_iter().take(100).collect();
        let m = modification(FeatureType::Nose, 0.5, 1.0);
        assert_eq!(apply_displacement(&short, &m), short);
    }

    #[test]
    fn test_monotonic_intensity() {
        let base = mesh();
        for feature in FeatureType::ALL {
            let indices = control_map().indices(feature);
            let mut prev = 0.0;
            for step in 0..=10 {
                let amount = step as f64 / 10.0;
                let out = adjust_feature(&base, feature, amount);
                let avg = indices.iter().map(|&i| base[i].distance_2d(&out[i])).sum::<f64>()
                    / indices.len() as f64;
                assert!(avg + 1e-9 >= prev, "{feature}: {avg} < {prev} at {amount}");
                prev = avg;
            }
            assert!(prev > 0.0, "{feature} never moved");
        }
    }

    #[test]
    fn test_validate_transformation() {
        let base = mesh();
        let mut moved = base.clone();
        moved[0].x += 30.0;
        let v = validate_transformation(&base, &moved);
        assert!(v.valid);
        assert!(v.natural);
        assert!((v.max_distance - 30.0).abs() < 1e-9);
        assert_eq!(v.affected_points, 1);

        moved[1].y += 60.0;
        assert!(!validate_transformation(&base, &moved).valid);

        let v = validate_transformation(&base, &base[..10]);
        assert!(!v.valid && !v.natural);
    }

    #[test]
    fn test_warp_identity_is_noop() {
        let img = gradient(100, 100);
        let lm = vec![Point3D::new(50.0, 50.0, 0.0); FACE_MESH_LANDMARKS];
        let out = warp_image(&img, &lm, &lm);
        assert_eq!(out, img);
    }

    #[test]
    fn test_warp_wrong_landmark_count_is_noop() {
        let img = gradient(64, 64);
        let base: Vec<Point3D> = mesh().into_iter().take(467).collect();
        let moved: Vec<Point3D> = base.iter().map(|p| p.translated(5.0, 0.0)).collect();
        assert_eq!(warp_image(&img, &base, &moved), img);
        assert_eq!(warp_feature(&img, &base, FeatureType::Nose, 1.0), img);
    }

    #[test]
    fn test_warp_too_few_moved_is_noop() {
        let img = gradient(200, 200);
        let base = mesh();
        let mut moved = base.clone();
        moved[0].x += 5.0;
        moved[1].x += 5.0;
        assert_eq!(warp_image(&img, &base, &moved), img);
    }

    #[test]
    fn test_warp_moves_content_to_modified_positions() {
        let img = gradient(200, 200);
        let base = mesh();
        let mut moved = base.clone();
        // Shift a cluster of grid points 4 px right.
        let shifted: Vec<usize> = vec![100, 101, 102, 122, 123, 124, 144, 145, 146];
        for &i in &shifted {
            moved[i].x += 4.0;
        }

        let out = warp_image(&img, &base, &moved);
        assert_eq!(out.dimensions(), img.dimensions());
        for &i in &shifted {
            let (mx, my) = (moved[i].x as u32, moved[i].y as u32);
            let expected = base[i].x as i32;
            let got = out.get_pixel(mx, my).0[0] as i32;
            assert!(
                (got - expected).abs() <= 1,
                "landmark {i}: pixel at ({mx}, {my}) = {got}, expected ~{expected}"
            );
        }
        // Corners are pinned.
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(0, 0));
        assert_eq!(out.get_pixel(199, 199), img.get_pixel(199, 199));
    }

    #[test]
    fn test_reflect_border() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(6, 5), 3);
        assert_eq!(reflect(3, 5), 3);
        assert_eq!(reflect(7, 1), 0);
    }

    #[test]
    fn test_sample_bilinear_midpoint() {
        let img = gradient(10, 10);
        let px = sample_bilinear(&img, 2.5, 3.0);
        // Halfway between 2 and 3 rounds to 3 (2.5 rounds away from zero).
        assert_eq!(px, [3, 3, 128]);
    }
}
