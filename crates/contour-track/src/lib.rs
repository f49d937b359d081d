//! contour-track — Adaptive real-time face landmark tracking.
//!
//! A pull-based scheduler that decides per frame between full-frame
//! detection, ROI re-detection and extrapolation, recovers from lost faces
//! and adapts its frame skip to measured load.

pub mod config;
pub mod detector;
pub mod quality;
pub mod replay;
pub mod roi;
pub mod scheduler;
pub mod source;
pub mod state;

pub use config::{ConfigError, TrackerConfig, TrackingParams};
pub use detector::Detector;
pub use replay::{ReplayDetector, ReplayError};
pub use scheduler::{track_faces, DetectionStrategy, TrackedFrame, TrackingScheduler};
pub use source::{FrameCursor, FrameSource, ImageDirSource, SourceError, VecFrameSource};
pub use state::{AdaptiveScheduleConfig, PerformanceStats, TrackingState};
