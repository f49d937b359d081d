//! Per-feature landmark adjustments.
//!
//! Each adjustment is a pure map `(landmarks, amount) -> landmarks'` with
//! `amount` in [-1, 1] scaled by a hand-tuned pixel range. Inputs that are
//! not a complete face mesh come back unchanged.

use crate::features::{
    CHEEK_PROMINENCE, CHIN, JAWLINE, JAW_CORNERS, LEFT_CHEEK, LEFT_EYE, LEFT_EYE_CORNERS,
    LEFT_EYE_OUTER, LEFT_NOSTRIL, NOSE_BRIDGE, NOSE_BRIDGE_EXTENDED, NOSE_TIP, NOSE_TIP_EXTENDED,
    RIGHT_CHEEK, RIGHT_EYE, RIGHT_EYE_CORNERS, RIGHT_EYE_OUTER, RIGHT_NOSTRIL,
};
use crate::types::{Point3D, FACE_MESH_LANDMARKS};
use serde::{Deserialize, Serialize};

/// Adjustments with a smaller magnitude are treated as "no change".
pub const NEGLIGIBLE_ADJUSTMENT: f64 = 0.01;

// --- Pixel ranges for a full-strength (±1.0) adjustment ---
const NOSE_HEIGHT_PX: f64 = 15.0;
const NOSE_WIDTH_PX: f64 = 10.0;
const NOSE_TIP_PX: f64 = 8.0;
const NOSE_BRIDGE_DEPTH: f64 = 5.0;
const EYE_SIZE_PX: f64 = 8.0;
const EYE_SHAPE_PX: f64 = 5.0;
const EYE_POSITION_PX: f64 = 6.0;
const EYE_ANGLE_PX: f64 = 4.0;
const JAW_WIDTH_PX: f64 = 15.0;
const JAW_ANGLE_PX: f64 = 8.0;
const JAW_LENGTH_PX: f64 = 10.0;
const CHEEK_HEIGHT_PX: f64 = 8.0;
const CHEEK_WIDTH_PX: f64 = 12.0;
const CHEEK_PROMINENCE_DEPTH: f64 = 6.0;

fn is_active(amount: f64) -> bool {
    amount.abs() > NEGLIGIBLE_ADJUSTMENT
}

fn clamp_amount(amount: f64) -> f64 {
    if amount.is_finite() {
        amount.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn shift(points: &mut [Point3D], indices: &[usize], dx: f64, dy: f64, dz: f64) {
    for &i in indices {
        if let Some(p) = points.get_mut(i) {
            p.x += dx;
            p.y += dy;
            p.z += dz;
        }
    }
}

/// Mean of the landmarks at `indices`, ignoring indices out of range.
fn centroid(points: &[Point3D], indices: &[usize]) -> Option<Point3D> {
    let selected: Vec<&Point3D> = indices.iter().filter_map(|&i| points.get(i)).collect();
    if selected.is_empty() {
        return None;
    }
    let n = selected.len() as f64;
    Some(Point3D::new(
        selected.iter().map(|p| p.x).sum::<f64>() / n,
        selected.iter().map(|p| p.y).sum::<f64>() / n,
        selected.iter().map(|p| p.z).sum::<f64>() / n,
    ))
}

fn scale_about(points: &mut [Point3D], indices: &[usize], factor: f64) {
    let Some(c) = centroid(points, indices) else {
        return;
    };
    for &i in indices {
        if let Some(p) = points.get_mut(i) {
            p.x = c.x + (p.x - c.x) * factor;
            p.y = c.y + (p.y - c.y) * factor;
        }
    }
}

/// Copy the mesh and run `f` on it, or return it untouched when incomplete.
fn adjusted(landmarks: &[Point3D], amount: f64, f: impl FnOnce(&mut [Point3D], f64)) -> Vec<Point3D> {
    let mut out = landmarks.to_vec();
    if landmarks.len() != FACE_MESH_LANDMARKS {
        return out;
    }
    f(&mut out, clamp_amount(amount));
    out
}

// --- Nose ---

/// Raise (positive) or lower the nose tip; the bridge follows at half strength.
pub fn nose_height(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * NOSE_HEIGHT_PX;
        shift(pts, &NOSE_TIP, 0.0, -d, 0.0);
        shift(pts, &NOSE_BRIDGE, 0.0, -d * 0.5, 0.0);
    })
}

/// Move the nostrils apart in opposite x directions.
pub fn nose_width(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * NOSE_WIDTH_PX;
        shift(pts, &LEFT_NOSTRIL, -d, 0.0, 0.0);
        shift(pts, &RIGHT_NOSTRIL, d, 0.0, 0.0);
    })
}

pub fn nose_tip(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        shift(pts, &NOSE_TIP_EXTENDED, 0.0, a * NOSE_TIP_PX, 0.0);
    })
}

/// Bridge projection; only changes depth.
pub fn nose_bridge(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        shift(pts, &NOSE_BRIDGE_EXTENDED, 0.0, 0.0, a * NOSE_BRIDGE_DEPTH);
    })
}

// --- Eyes ---

/// Scale each eye radially about its own centroid.
pub fn eye_size(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let factor = 1.0 + a * EYE_SIZE_PX * 0.1;
        scale_about(pts, &LEFT_EYE, factor);
        scale_about(pts, &RIGHT_EYE, factor);
    })
}

pub fn eye_shape(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * EYE_SHAPE_PX;
        shift(pts, &LEFT_EYE_CORNERS, d, -d * 0.5, 0.0);
        shift(pts, &RIGHT_EYE_CORNERS, -d, -d * 0.5, 0.0);
    })
}

/// Move the eyes toward (positive) or away from each other.
pub fn eye_position(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * EYE_POSITION_PX;
        shift(pts, &LEFT_EYE, d, 0.0, 0.0);
        shift(pts, &RIGHT_EYE, -d, 0.0, 0.0);
    })
}

pub fn eye_angle(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * EYE_ANGLE_PX;
        shift(pts, &[LEFT_EYE_OUTER, RIGHT_EYE_OUTER], 0.0, -d, 0.0);
    })
}

// --- Jawline ---

/// Push each jaw landmark away from (positive) or toward the jaw's mean x.
pub fn jaw_width(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * JAW_WIDTH_PX;
        let Some(center) = centroid(pts, &JAWLINE) else {
            return;
        };
        for &i in &JAWLINE {
            let p = &mut pts[i];
            if p.x - center.x > 0.0 {
                p.x += d;
            } else {
                p.x -= d;
            }
        }
    })
}

pub fn jaw_angle(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        shift(pts, &JAW_CORNERS, 0.0, a * JAW_ANGLE_PX, 0.0);
    })
}

pub fn jaw_length(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        shift(pts, &CHIN, 0.0, a * JAW_LENGTH_PX, 0.0);
    })
}

// --- Cheekbones ---

pub fn cheek_height(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * CHEEK_HEIGHT_PX;
        shift(pts, &LEFT_CHEEK, 0.0, -d, 0.0);
        shift(pts, &RIGHT_CHEEK, 0.0, -d, 0.0);
    })
}

pub fn cheek_width(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        let d = a * CHEEK_WIDTH_PX;
        shift(pts, &LEFT_CHEEK, -d, 0.0, 0.0);
        shift(pts, &RIGHT_CHEEK, d, 0.0, 0.0);
    })
}

pub fn cheek_prominence(landmarks: &[Point3D], amount: f64) -> Vec<Point3D> {
    adjusted(landmarks, amount, |pts, a| {
        shift(pts, &CHEEK_PROMINENCE, 0.0, 0.0, a * CHEEK_PROMINENCE_DEPTH);
    })
}

// --- Configs ---

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoseConfig {
    pub height: f64,
    pub width: f64,
    pub tip: f64,
    pub bridge: f64,
}

impl NoseConfig {
    pub fn has_modifications(&self) -> bool {
        [self.height, self.width, self.tip, self.bridge]
            .into_iter()
            .any(is_active)
    }

    pub fn apply(&self, landmarks: &[Point3D]) -> Vec<Point3D> {
        let mut out = landmarks.to_vec();
        if is_active(self.height) {
            out = nose_height(&out, self.height);
        }
        if is_active(self.width) {
            out = nose_width(&out, self.width);
        }
        if is_active(self.tip) {
            out = nose_tip(&out, self.tip);
        }
        if is_active(self.bridge) {
            out = nose_bridge(&out, self.bridge);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    pub size: f64,
    pub shape: f64,
    pub position: f64,
    pub angle: f64,
}

impl EyeConfig {
    pub fn has_modifications(&self) -> bool {
        [self.size, self.shape, self.position, self.angle]
            .into_iter()
            .any(is_active)
    }

    pub fn apply(&self, landmarks: &[Point3D]) -> Vec<Point3D> {
        let mut out = landmarks.to_vec();
        if is_active(self.size) {
            out = eye_size(&out, self.size);
        }
        if is_active(self.shape) {
            out = eye_shape(&out, self.shape);
        }
        if is_active(self.position) {
            out = eye_position(&out, self.position);
        }
        if is_active(self.angle) {
            out = eye_angle(&out, self.angle);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JawlineConfig {
    pub width: f64,
    pub angle: f64,
    pub length: f64,
}

impl JawlineConfig {
    pub fn has_modifications(&self) -> bool {
        [self.width, self.angle, self.length].into_iter().any(is_active)
    }

    pub fn apply(&self, landmarks: &[Point3D]) -> Vec<Point3D> {
        let mut out = landmarks.to_vec();
        if is_active(self.width) {
            out = jaw_width(&out, self.width);
        }
        if is_active(self.angle) {
            out = jaw_angle(&out, self.angle);
        }
        if is_active(self.length) {
            out = jaw_length(&out, self.length);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheekboneConfig {
    pub height: f64,
    pub width: f64,
    pub prominence: f64,
}

impl CheekboneConfig {
    pub fn has_modifications(&self) -> bool {
        [self.height, self.width, self.prominence]
            .into_iter()
            .any(is_active)
    }

    pub fn apply(&self, landmarks: &[Point3D]) -> Vec<Point3D> {
        let mut out = landmarks.to_vec();
        if is_active(self.height) {
            out = cheek_height(&out, self.height);
        }
        if is_active(self.width) {
            out = cheek_width(&out, self.width);
        }
        if is_active(self.prominence) {
            out = cheek_prominence(&out, self.prominence);
        }
        out
    }
}

/// Every requested feature adjustment for one surgery run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeryConfig {
    pub nose: NoseConfig,
    pub eyes: EyeConfig,
    pub jawline: JawlineConfig,
    pub cheekbones: CheekboneConfig,
}

impl SurgeryConfig {
    /// Mean magnitude of the eight primary adjustments, in [0, 1].
    pub fn total_intensity(&self) -> f64 {
        let sum = [
            self.nose.height,
            self.nose.width,
            self.eyes.size,
            self.eyes.shape,
            self.jawline.width,
            self.jawline.angle,
            self.cheekbones.height,
            self.cheekbones.width,
        ]
        .iter()
        .map(|a| clamp_amount(*a).abs())
        .sum::<f64>();
        sum / 8.0
    }
}
