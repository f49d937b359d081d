use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of points in a face-mesh landmark set.
pub const FACE_MESH_LANDMARKS: usize = 468;

/// A landmark position in image pixels. `z` is a relative-depth hint only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane, ignoring depth.
    pub fn distance_2d(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z)
    }

    /// Move the point along `vector` scaled by `amount`.
    pub fn displaced(&self, vector: &Vector3D, amount: f64) -> Self {
        Self::new(
            self.x + vector.x * amount,
            self.y + vector.y * amount,
            self.z + vector.z * amount,
        )
    }

    pub fn to_2d(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// A displacement direction for a feature modification.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3D {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag == 0.0 {
            return Self::default();
        }
        Self::new(self.x / mag, self.y / mag, self.z / mag)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

/// Integer pixel rectangle produced by a detector. Replaced, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x2(&self) -> i32 {
        self.x + self.width
    }

    pub fn y2(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point3D {
        Point3D::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
            0.0,
        )
    }

    pub fn area(&self) -> f64 {
        self.width.max(0) as f64 * self.height.max(0) as f64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.x >= self.x && other.y >= self.y && other.x2() <= self.x2() && other.y2() <= self.y2()
    }
}

/// A named group of landmarks with a derived center and polygon area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub name: String,
    pub points: Vec<Point3D>,
    pub center: Point3D,
    pub area: f64,
}

impl FaceRegion {
    pub fn from_points(name: &str, points: Vec<Point3D>) -> Self {
        if points.is_empty() {
            return Self {
                name: name.to_string(),
                points,
                center: Point3D::default(),
                area: 0.0,
            };
        }

        let n = points.len() as f64;
        let center = Point3D::new(
            points.iter().map(|p| p.x).sum::<f64>() / n,
            points.iter().map(|p| p.y).sum::<f64>() / n,
            points.iter().map(|p| p.z).sum::<f64>() / n,
        );

        // Shoelace over the points in landmark order.
        let area = if points.len() >= 3 {
            let mut twice = 0.0;
            for i in 0..points.len() {
                let a = &points[i];
                let b = &points[(i + 1) % points.len()];
                twice += a.x * b.y - b.x * a.y;
            }
            twice.abs() / 2.0
        } else {
            0.0
        };

        Self {
            name: name.to_string(),
            points,
            center,
            area,
        }
    }

    /// Axis-aligned integer bounds of the region points.
    pub fn bounding_box(&self) -> BoundingBox {
        if self.points.is_empty() {
            return BoundingBox::default();
        }
        let min_x = self.points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = self.points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = self.points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = self.points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        BoundingBox::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x) as i32,
            (max_y - min_y) as i32,
        )
    }
}

/// One face found by a detector in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub bbox: BoundingBox,
    /// Detector confidence in [0, 1].
    pub confidence: f64,
    pub landmarks: Vec<Point3D>,
    #[serde(default)]
    pub regions: HashMap<String, FaceRegion>,
}

impl DetectionResult {
    /// Build a result and derive its face regions from the landmarks.
    pub fn new(bbox: BoundingBox, confidence: f64, landmarks: Vec<Point3D>) -> Self {
        let regions = crate::regions::face_regions(&landmarks);
        Self {
            bbox,
            confidence,
            landmarks,
            regions,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.confidence > 0.5 && !self.landmarks.is_empty()
    }

    /// Copy shifted by `(dx, dy)`, e.g. from ROI to full-frame coordinates.
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        let landmarks: Vec<Point3D> = self
            .landmarks
            .iter()
            .map(|p| p.translated(dx as f64, dy as f64))
            .collect();
        Self::new(self.bbox.translated(dx, dy), self.confidence, landmarks)
    }
}
