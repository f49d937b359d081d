//! Coarse face-structure classification from mesh ratios.
//!
//! Shapes are read off a handful of horizontal and vertical spans; the
//! symmetry score compares left and right offsets from the face midline.

use crate::types::{Point3D, FACE_MESH_LANDMARKS};
use serde::{Deserialize, Serialize};

// --- Mesh indices ---
const FOREHEAD_TOP: usize = 10;
const CHIN: usize = 152;
const LEFT_CHEEK: usize = 234;
const RIGHT_CHEEK: usize = 454;
const LEFT_JAW: usize = 172;
const RIGHT_JAW: usize = 397;
const LEFT_EYE_OUTER: usize = 33;
const LEFT_EYE_INNER: usize = 133;
const LEFT_EYE_TOP: usize = 159;
const LEFT_EYE_BOTTOM: usize = 145;
const RIGHT_EYE_INNER: usize = 362;
const MOUTH_LEFT: usize = 61;
const MOUTH_RIGHT: usize = 291;
const UPPER_LIP: usize = 13;
const LOWER_LIP: usize = 14;

/// Left/right landmark pairs compared against the midline.
const SYMMETRY_PAIRS: [(usize, usize); 3] = [
    (LEFT_EYE_OUTER, RIGHT_EYE_INNER),
    (MOUTH_LEFT, MOUTH_RIGHT),
    (LEFT_CHEEK, RIGHT_CHEEK),
];
/// Summed asymmetry (px) that drives the score to zero.
const MAX_ASYMMETRY_PX: f64 = 50.0;

// --- Classification bands ---
const ROUND_FACE_WIDTH_RATIO: f64 = 0.8;
const SQUARE_JAW_RATIO: f64 = 0.9;
const OBLONG_FACE_WIDTH_RATIO: f64 = 0.6;
const ROUND_EYE_RATIO: f64 = 0.6;
const MONOLID_EYE_RATIO: f64 = 0.3;
const THIN_LIP_RATIO: f64 = 0.2;

/// Reported until skin sampling from pixels exists.
pub const DEFAULT_SKIN_TONE: [u8; 3] = [200, 180, 160];
const DEFAULT_SYMMETRY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceShape {
    Oval,
    Round,
    Square,
    Heart,
    Diamond,
    Oblong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeShape {
    Almond,
    Round,
    Monolid,
    Hooded,
    Upturned,
    Downturned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoseShape {
    Straight,
    Roman,
    Button,
    Hawk,
    Snub,
    Crooked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LipShape {
    Full,
    Thin,
    Wide,
    Small,
    Heart,
    Round,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub face_shape: FaceShape,
    pub skin_tone: [u8; 3],
    pub eye_shape: EyeShape,
    pub nose_shape: NoseShape,
    pub lip_shape: LipShape,
    /// In [0, 1]; 1 is perfectly mirrored about the midline.
    pub symmetry_score: f64,
}

impl Default for FaceAnalysis {
    fn default() -> Self {
        Self {
            face_shape: FaceShape::Oval,
            skin_tone: DEFAULT_SKIN_TONE,
            eye_shape: EyeShape::Almond,
            nose_shape: NoseShape::Straight,
            lip_shape: LipShape::Full,
            symmetry_score: DEFAULT_SYMMETRY,
        }
    }
}

/// Classify face, eye and lip shape and score symmetry.
///
/// Meshes with fewer than 468 points get [`FaceAnalysis::default`].
pub fn analyze_face_structure(landmarks: &[Point3D]) -> FaceAnalysis {
    if landmarks.len() < FACE_MESH_LANDMARKS {
        return FaceAnalysis::default();
    }
    FaceAnalysis {
        face_shape: face_shape(landmarks),
        skin_tone: DEFAULT_SKIN_TONE,
        eye_shape: eye_shape(landmarks),
        nose_shape: NoseShape::Straight,
        lip_shape: lip_shape(landmarks),
        symmetry_score: symmetry_score(landmarks),
    }
}

fn span_x(landmarks: &[Point3D], a: usize, b: usize) -> f64 {
    (landmarks[a].x - landmarks[b].x).abs()
}

fn span_y(landmarks: &[Point3D], a: usize, b: usize) -> f64 {
    (landmarks[a].y - landmarks[b].y).abs()
}

/// `num / den`, or `fallback` when the denominator is degenerate.
fn ratio_or(num: f64, den: f64, fallback: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        fallback
    }
}

fn face_shape(landmarks: &[Point3D]) -> FaceShape {
    let cheek_width = span_x(landmarks, LEFT_CHEEK, RIGHT_CHEEK);
    let jaw_width = span_x(landmarks, LEFT_JAW, RIGHT_JAW);
    let face_length = span_y(landmarks, FOREHEAD_TOP, CHIN);

    let width_ratio = ratio_or(cheek_width, face_length, 1.0);
    let jaw_ratio = ratio_or(jaw_width, cheek_width, 1.0);

    if width_ratio > ROUND_FACE_WIDTH_RATIO {
        FaceShape::Round
    } else if jaw_ratio > SQUARE_JAW_RATIO {
        FaceShape::Square
    } else if width_ratio < OBLONG_FACE_WIDTH_RATIO {
        FaceShape::Oblong
    } else {
        FaceShape::Oval
    }
}

fn eye_shape(landmarks: &[Point3D]) -> EyeShape {
    let width = span_x(landmarks, LEFT_EYE_OUTER, LEFT_EYE_INNER);
    let height = span_y(landmarks, LEFT_EYE_TOP, LEFT_EYE_BOTTOM);
    let ratio = ratio_or(height, width, 0.5);
    if ratio > ROUND_EYE_RATIO {
        EyeShape::Round
    } else if ratio < MONOLID_EYE_RATIO {
        EyeShape::Monolid
    } else {
        EyeShape::Almond
    }
}

fn lip_shape(landmarks: &[Point3D]) -> LipShape {
    let width = span_x(landmarks, MOUTH_LEFT, MOUTH_RIGHT);
    let height = span_y(landmarks, UPPER_LIP, LOWER_LIP);
    if ratio_or(height, width, 0.3) < THIN_LIP_RATIO {
        LipShape::Thin
    } else {
        LipShape::Full
    }
}

fn symmetry_score(landmarks: &[Point3D]) -> f64 {
    let midline = (landmarks[FOREHEAD_TOP].x + landmarks[CHIN].x) / 2.0;
    let asymmetry: f64 = SYMMETRY_PAIRS
        .iter()
        .map(|&(l, r)| ((landmarks[l].x - midline).abs() - (landmarks[r].x - midline).abs()).abs())
        .sum();
    (1.0 - asymmetry / MAX_ASYMMETRY_PX).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Symmetric mesh about x = 100 with the given face spans.
    fn mesh(cheek_width: f64, face_length: f64, jaw_width: f64) -> Vec<Point3D> {
        let mut lm = vec![Point3D::default(); FACE_MESH_LANDMARKS];
        lm[FOREHEAD_TOP] = Point3D::new(100.0, 0.0, 0.0);
        lm[CHIN] = Point3D::new(100.0, face_length, 0.0);
        lm[LEFT_CHEEK] = Point3D::new(100.0 - cheek_width / 2.0, 50.0, 0.0);
        lm[RIGHT_CHEEK] = Point3D::new(100.0 + cheek_width / 2.0, 50.0, 0.0);
        lm[LEFT_JAW] = Point3D::new(100.0 - jaw_width / 2.0, 80.0, 0.0);
        lm[RIGHT_JAW] = Point3D::new(100.0 + jaw_width / 2.0, 80.0, 0.0);
        // Eye 20 wide, 8 tall.
        lm[LEFT_EYE_OUTER] = Point3D::new(70.0, 40.0, 0.0);
        lm[LEFT_EYE_INNER] = Point3D::new(90.0, 40.0, 0.0);
        lm[LEFT_EYE_TOP] = Point3D::new(80.0, 36.0, 0.0);
        lm[LEFT_EYE_BOTTOM] = Point3D::new(80.0, 44.0, 0.0);
        lm[RIGHT_EYE_INNER] = Point3D::new(130.0, 40.0, 0.0);
        // Mouth 30 wide, 8 tall.
        lm[MOUTH_LEFT] = Point3D::new(85.0, 90.0, 0.0);
        lm[MOUTH_RIGHT] = Point3D::new(115.0, 90.0, 0.0);
        lm[UPPER_LIP] = Point3D::new(100.0, 86.0, 0.0);
        lm[LOWER_LIP] = Point3D::new(100.0, 94.0, 0.0);
        lm
    }

    #[test]
    fn test_incomplete_mesh_gets_defaults() {
        let a = analyze_face_structure(&mesh(100.0, 140.0, 70.0)[..467]);
        assert_eq!(a, FaceAnalysis::default());
        assert_eq!(a.symmetry_score, 0.5);
        assert_eq!(a.skin_tone, DEFAULT_SKIN_TONE);
        assert_eq!(analyze_face_structure(&[]), FaceAnalysis::default());
    }

    #[test]
    fn test_face_shape_bands() {
        let shape = |cw, len, jw| analyze_face_structure(&mesh(cw, len, jw)).face_shape;
        // width/length 0.71, jaw/cheek 0.7
        assert_eq!(shape(100.0, 140.0, 70.0), FaceShape::Oval);
        // width/length 0.91
        assert_eq!(shape(100.0, 110.0, 70.0), FaceShape::Round);
        // jaw/cheek 0.95
        assert_eq!(shape(100.0, 140.0, 95.0), FaceShape::Square);
        // width/length 0.5
        assert_eq!(shape(100.0, 200.0, 70.0), FaceShape::Oblong);
        // Wide face wins over a square jaw.
        assert_eq!(shape(100.0, 110.0, 95.0), FaceShape::Round);
    }

    #[test]
    fn test_eye_shape_bands() {
        let mut lm = mesh(100.0, 140.0, 70.0);
        assert_eq!(analyze_face_structure(&lm).eye_shape, EyeShape::Almond);

        lm[LEFT_EYE_BOTTOM].y = 50.0; // 14 / 20
        assert_eq!(analyze_face_structure(&lm).eye_shape, EyeShape::Round);

        lm[LEFT_EYE_BOTTOM].y = 40.0; // 4 / 20
        assert_eq!(analyze_face_structure(&lm).eye_shape, EyeShape::Monolid);

        // Zero-width eye falls back to the middle band.
        lm[LEFT_EYE_INNER].x = 70.0;
        assert_eq!(analyze_face_structure(&lm).eye_shape, EyeShape::Almond);
    }

    #[test]
    fn test_lip_shape_bands() {
        let mut lm = mesh(100.0, 140.0, 70.0);
        assert_eq!(analyze_face_structure(&lm).lip_shape, LipShape::Full);

        lm[LOWER_LIP].y = 89.0; // 3 / 30
        assert_eq!(analyze_face_structure(&lm).lip_shape, LipShape::Thin);

        lm[LOWER_LIP].y = 101.0; // 15 / 30
        assert_eq!(analyze_face_structure(&lm).lip_shape, LipShape::Full);
    }

    #[test]
    fn test_symmetry_score() {
        let mut lm = mesh(100.0, 140.0, 70.0);
        let a = analyze_face_structure(&lm);
        assert!((a.symmetry_score - 1.0).abs() < 1e-9);
        assert_eq!(a.nose_shape, NoseShape::Straight);

        // Right cheek 10 px further from the midline than the left.
        lm[RIGHT_CHEEK].x += 10.0;
        assert!((analyze_face_structure(&lm).symmetry_score - 0.8).abs() < 1e-9);

        lm[RIGHT_CHEEK].x += 100.0;
        assert_eq!(analyze_face_structure(&lm).symmetry_score, 0.0);
    }
}
