//! Feature control map.
//!
//! Maps each modifiable facial feature to its face-mesh landmark indices and a
//! natural displacement limit in pixels. The default table is built once and
//! shared read-only by every session.

use crate::types::Point3D;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// --- Face-mesh index sets used by the feature adjustments ---
pub const NOSE_TIP: [usize; 2] = [1, 2];
pub const NOSE_TIP_EXTENDED: [usize; 3] = [1, 2, 5];
pub const NOSE_BRIDGE: [usize; 3] = [6, 19, 20];
pub const NOSE_BRIDGE_EXTENDED: [usize; 6] = [6, 19, 20, 94, 125, 141];
pub const LEFT_NOSTRIL: [usize; 5] = [278, 279, 280, 281, 282];
pub const RIGHT_NOSTRIL: [usize; 5] = [294, 295, 296, 297, 298];

pub const LEFT_EYE: [usize; 16] = crate::regions::LEFT_EYE;
pub const RIGHT_EYE: [usize; 16] = crate::regions::RIGHT_EYE;
pub const LEFT_EYE_CORNERS: [usize; 2] = [33, 133];
pub const RIGHT_EYE_CORNERS: [usize; 2] = [362, 263];
pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 362;

pub const JAWLINE: [usize; 16] = [
    172, 136, 150, 149, 176, 148, 152, 377, 400, 378, 379, 365, 397, 288, 361, 323,
];
pub const JAW_CORNERS: [usize; 2] = [172, 397];
pub const CHIN: [usize; 2] = [152, 175];

pub const LEFT_CHEEK: [usize; 6] = [116, 117, 118, 119, 120, 121];
pub const RIGHT_CHEEK: [usize; 6] = [345, 346, 347, 348, 349, 350];
pub const CHEEK_PROMINENCE: [usize; 6] = [116, 117, 118, 345, 346, 347];

const NOSE_CONTROL: [usize; 31] = [
    1, 2, 5, 6, 19, 20, 94, 125, 141, 235, 236, 237, 238, 239, 240, 241, 242, 278, 279, 280, 281,
    282, 294, 295, 296, 297, 298, 299, 300, 301, 302,
];

const EYES_CONTROL: [usize; 32] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246, 362, 382, 381,
    380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
];

const CHEEKBONES_CONTROL: [usize; 32] = [
    116, 117, 118, 119, 120, 121, 126, 142, 36, 205, 206, 207, 213, 192, 147, 187, 345, 346, 347,
    348, 349, 350, 355, 371, 266, 425, 426, 427, 436, 416, 376, 411,
];

/// A modifiable facial feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Nose,
    Eyes,
    Jawline,
    Cheekbones,
}

impl FeatureType {
    /// Application order used by the surgery orchestrator.
    pub const ALL: [FeatureType; 4] = [Self::Nose, Self::Eyes, Self::Cheekbones, Self::Jawline];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::Eyes => "eyes",
            Self::Jawline => "jawline",
            Self::Cheekbones => "cheekbones",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nose" => Some(Self::Nose),
            "eyes" | "eye" => Some(Self::Eyes),
            "jawline" | "jaw" => Some(Self::Jawline),
            "cheekbones" | "cheekbone" | "cheeks" => Some(Self::Cheekbones),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control indices and natural limit for one feature.
#[derive(Debug, Clone)]
pub struct FeatureEntry {
    pub indices: Vec<usize>,
    /// Largest displacement, in pixels, still considered natural.
    pub natural_limit_px: f64,
}

/// Read-only table of feature control points and limits.
#[derive(Debug, Clone)]
pub struct FeatureControlMap {
    nose: FeatureEntry,
    eyes: FeatureEntry,
    jawline: FeatureEntry,
    cheekbones: FeatureEntry,
}

impl Default for FeatureControlMap {
    fn default() -> Self {
        Self::with_limits(15.0, 10.0, 20.0, 12.0)
    }
}

impl FeatureControlMap {
    /// Default index sets with custom per-feature natural limits (pixels).
    pub fn with_limits(nose: f64, eyes: f64, jawline: f64, cheekbones: f64) -> Self {
        Self {
            nose: FeatureEntry {
                indices: NOSE_CONTROL.to_vec(),
                natural_limit_px: nose,
            },
            eyes: FeatureEntry {
                indices: EYES_CONTROL.to_vec(),
                natural_limit_px: eyes,
            },
            jawline: FeatureEntry {
                indices: JAWLINE.to_vec(),
                natural_limit_px: jawline,
            },
            cheekbones: FeatureEntry {
                indices: CHEEKBONES_CONTROL.to_vec(),
                natural_limit_px: cheekbones,
            },
        }
    }

    pub fn entry(&self, feature: FeatureType) -> &FeatureEntry {
        match feature {
            FeatureType::Nose => &self.nose,
            FeatureType::Eyes => &self.eyes,
            FeatureType::Jawline => &self.jawline,
            FeatureType::Cheekbones => &self.cheekbones,
        }
    }

    pub fn indices(&self, feature: FeatureType) -> &[usize] {
        &self.entry(feature).indices
    }

    pub fn natural_limit(&self, feature: FeatureType) -> f64 {
        self.entry(feature).natural_limit_px
    }

    /// Landmarks at the feature's control indices, skipping indices out of range.
    pub fn control_points(&self, landmarks: &[Point3D], feature: FeatureType) -> Vec<Point3D> {
        self.indices(feature)
            .iter()
            .filter_map(|&i| landmarks.get(i).copied())
            .collect()
    }
}

static CONTROL_MAP: OnceLock<FeatureControlMap> = OnceLock::new();

/// The process-wide default control map.
pub fn control_map() -> &'static FeatureControlMap {
    CONTROL_MAP.get_or_init(FeatureControlMap::default)
}
