use crate::state::AdaptiveScheduleConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Minimum ROI expansion around the last known face box.
pub const MIN_ROI_EXPANSION: f64 = 1.3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tracking thresholds that stay fixed for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParams {
    /// Misses tolerated before tracking resets to searching.
    pub max_lost_frames: u32,
    pub min_consecutive_detections: u32,
    pub min_stability_frames: u32,
    /// Scale applied to the last face box when building a detection ROI.
    pub roi_expansion: f64,
    /// Average center movement (pixels) under which recent boxes count as stable.
    pub stability_threshold_px: f64,
    #[serde(with = "duration_ms", rename = "target_frame_time_ms")]
    pub target_frame_time: Duration,
    /// Sleep off part of the slack while tracking steadily.
    pub pacing: bool,
    /// Consecutive empty reads from an active source before giving up.
    pub max_empty_reads: u32,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            max_lost_frames: 15,
            min_consecutive_detections: 3,
            min_stability_frames: 5,
            roi_expansion: MIN_ROI_EXPANSION,
            stability_threshold_px: 10.0,
            target_frame_time: Duration::from_millis(33),
            pacing: true,
            max_empty_reads: 30,
        }
    }
}

/// Full scheduler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub schedule: AdaptiveScheduleConfig,
    pub tracking: TrackingParams,
}

impl TrackerConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        Ok(config.validated())
    }

    /// Defaults overridden by `CONTOUR_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply any `CONTOUR_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `var`. Unset or unparsable values keep
    /// the current setting.
    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let s = &mut self.schedule;
        if let Some(base_skip) = parse_var(&var, "CONTOUR_BASE_SKIP") {
            s.base_skip = base_skip;
            s.current_skip = base_skip;
        }
        s.max_skip = parse_var(&var, "CONTOUR_MAX_SKIP").unwrap_or(s.max_skip);
        if let Some(ms) = parse_var(&var, "CONTOUR_PERFORMANCE_THRESHOLD_MS") {
            s.performance_threshold = Duration::from_millis(ms);
        }
        s.quality_threshold = parse_var(&var, "CONTOUR_QUALITY_THRESHOLD").unwrap_or(s.quality_threshold);

        let t = &mut self.tracking;
        t.max_lost_frames = parse_var(&var, "CONTOUR_MAX_LOST_FRAMES").unwrap_or(t.max_lost_frames);
        t.roi_expansion = parse_var(&var, "CONTOUR_ROI_EXPANSION").unwrap_or(t.roi_expansion);
        if let Some(ms) = parse_var(&var, "CONTOUR_TARGET_FRAME_MS") {
            t.target_frame_time = Duration::from_millis(ms);
        }
        t.pacing = var("CONTOUR_PACING").map(|v| v != "0").unwrap_or(t.pacing);

        self.validated()
    }

    /// Clamp every field into its legal range.
    pub fn validated(mut self) -> Self {
        self.schedule = self.schedule.validated();
        if !self.tracking.roi_expansion.is_finite() || self.tracking.roi_expansion < MIN_ROI_EXPANSION {
            self.tracking.roi_expansion = MIN_ROI_EXPANSION;
        }
        if !self.tracking.stability_threshold_px.is_finite() || self.tracking.stability_threshold_px < 0.0 {
            self.tracking.stability_threshold_px = TrackingParams::default().stability_threshold_px;
        }
        self
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse().ok())
}

/// Serialize a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = TrackerConfig::default();
        assert_eq!(c.schedule.base_skip, 2);
        assert_eq!(c.schedule.max_skip, 8);
        assert_eq!(c.schedule.performance_threshold, Duration::from_millis(33));
        assert_eq!(c.tracking.max_lost_frames, 15);
        assert_eq!(c.tracking.min_stability_frames, 5);
        assert!(c.tracking.pacing);
    }

    #[test]
    fn test_partial_toml() {
        let c = TrackerConfig::from_toml_str(
            r#"
            [schedule]
            max_skip = 4
            performance_threshold_ms = 20

            [tracking]
            pacing = false
            "#,
        )
        .unwrap();
        assert_eq!(c.schedule.max_skip, 4);
        assert_eq!(c.schedule.base_skip, 2);
        assert_eq!(c.schedule.performance_threshold, Duration::from_millis(20));
        assert!(!c.tracking.pacing);
        assert_eq!(c.tracking.max_empty_reads, 30);
    }

    #[test]
    fn test_toml_is_validated() {
        let c = TrackerConfig::from_toml_str(
            r#"
            [schedule]
            max_skip = 3
            current_skip = 10
            [tracking]
            roi_expansion = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(c.schedule.current_skip, 3);
        assert_eq!(c.tracking.roi_expansion, MIN_ROI_EXPANSION);
    }

    #[test]
    fn test_bad_toml() {
        let err = TrackerConfig::from_toml_str("[schedule]\nmax_skip = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = TrackerConfig::load("/nonexistent/contour.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_toml_roundtrip_keys() {
        let text = toml::to_string(&TrackerConfig::default()).unwrap();
        assert!(text.contains("performance_threshold_ms = 33"));
        assert!(text.contains("target_frame_time_ms = 33"));
    }

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_overrides_keep_loaded_current_skip() {
        let loaded = TrackerConfig::from_toml_str("[schedule]\nbase_skip = 2\ncurrent_skip = 5").unwrap();
        let c = loaded.clone().with_overrides(vars(&[("CONTOUR_MAX_LOST_FRAMES", "20")]));
        assert_eq!(c.schedule.current_skip, 5);
        assert_eq!(c.tracking.max_lost_frames, 20);

        let c = loaded.with_overrides(vars(&[("CONTOUR_BASE_SKIP", "3")]));
        assert_eq!(c.schedule.base_skip, 3);
        assert_eq!(c.schedule.current_skip, 3);
    }

    #[test]
    fn test_overrides_parse_and_ignore_garbage() {
        let c = TrackerConfig::default().with_overrides(vars(&[
            ("CONTOUR_PERFORMANCE_THRESHOLD_MS", "50"),
            ("CONTOUR_TARGET_FRAME_MS", " 40 "),
            ("CONTOUR_QUALITY_THRESHOLD", "high"),
            ("CONTOUR_PACING", "0"),
        ]));
        assert_eq!(c.schedule.performance_threshold, Duration::from_millis(50));
        assert_eq!(c.tracking.target_frame_time, Duration::from_millis(40));
        assert_eq!(c.schedule.quality_threshold, 0.7);
        assert!(!c.tracking.pacing);
    }
}
