//! contour-core — Landmark geometry, thin-plate-spline warping and feature surgery.
//!
//! Operates on 468-point face meshes. Every per-index operation is a no-op
//! on incomplete meshes, and a failed warp always returns the input image.

pub mod adjust;
pub mod analysis;
pub mod features;
pub mod regions;
pub mod surgery;
pub mod tps;
pub mod types;
pub mod warp;

pub use adjust::SurgeryConfig;
pub use analysis::{analyze_face_structure, FaceAnalysis};
pub use features::{control_map, FeatureControlMap, FeatureType};
pub use surgery::{SurgeryEngine, SurgeryResult};
pub use tps::{TpsError, TpsModel};
pub use types::{BoundingBox, DetectionResult, FaceRegion, Point3D, Vector3D, FACE_MESH_LANDMARKS};
pub use warp::{
    apply_displacement, validate_transformation, warp_feature, warp_image, FeatureModification,
    ModificationError, TransformValidation,
};
