//! Named face regions over the 468-point face mesh.

use crate::types::{BoundingBox, FaceRegion, Point3D, FACE_MESH_LANDMARKS};
use std::collections::HashMap;

pub const LEFT_EYE: [usize; 16] = [
    33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246,
];

pub const RIGHT_EYE: [usize; 16] = [
    362, 382, 381, 380, 374, 373, 390, 249, 263, 466, 388, 387, 386, 385, 384, 398,
];

pub const NOSE: [usize; 26] = [
    1, 2, 5, 4, 6, 19, 20, 94, 125, 141, 235, 236, 3, 51, 48, 115, 131, 134, 102, 49, 220, 305,
    281, 363, 360, 279,
];

pub const LIPS: [usize; 30] = [
    61, 84, 17, 314, 405, 320, 307, 375, 321, 308, 324, 318, 402, 317, 14, 87, 178, 88, 95, 78,
    191, 80, 81, 82, 13, 312, 311, 310, 415, 308,
];

pub const FACE_OVAL: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

const REGION_TABLE: [(&str, &[usize]); 5] = [
    ("left_eye", &LEFT_EYE),
    ("right_eye", &RIGHT_EYE),
    ("nose", &NOSE),
    ("lips", &LIPS),
    ("face_oval", &FACE_OVAL),
];

/// Split a face mesh into named regions. Empty unless the mesh is complete.
pub fn face_regions(landmarks: &[Point3D]) -> HashMap<String, FaceRegion> {
    if landmarks.len() != FACE_MESH_LANDMARKS {
        return HashMap::new();
    }

    REGION_TABLE
        .iter()
        .map(|(name, indices)| {
            let points = indices.iter().map(|&i| landmarks[i]).collect();
            (name.to_string(), FaceRegion::from_points(name, points))
        })
        .collect()
}

/// Whether the box center lies within 20% of the frame size from the frame center.
pub fn is_face_centered(bbox: &BoundingBox, width: u32, height: u32) -> bool {
    let center = bbox.center();
    let frame_cx = width as f64 / 2.0;
    let frame_cy = height as f64 / 2.0;
    (center.x - frame_cx).abs() < width as f64 * 0.2
        && (center.y - frame_cy).abs() < height as f64 * 0.2
}
