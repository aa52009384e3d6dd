//! Configuration for the tracking and engagement pipeline.
//!
//! All tunables are read once before the pipeline starts. Every section is
//! `#[serde(default)]`, so a JSON file only needs to name the values it
//! overrides:
//!
//! ```rust
//! use intercept_rs::config::Config;
//!
//! let cfg: Config = serde_json::from_str(r#"{ "targeting": { "max_range_m": 80.0 } }"#).unwrap();
//! cfg.validate().expect("valid");
//! assert_eq!(cfg.targeting.max_range_m, 80.0);
//! assert_eq!(cfg.tracker.max_disappeared, 30);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 3.04 mm lens on a 3.68 mm wide sensor, 640 px frame.
pub const DEFAULT_FOCAL_LENGTH_PX: f64 = 3.04 / 3.68 * 640.0;

/// Chi-square 0.99 quantile for 2 degrees of freedom.
pub const CHI2_INV_99_2DOF: f64 = 9.2103;

/// Focal length in pixels from lens and sensor geometry.
pub fn focal_length_px_from_lens(focal_length_mm: f64, sensor_width_mm: f64, image_width_px: u32) -> f64 {
    focal_length_mm / sensor_width_mm * image_width_px as f64
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub targeting: TargetingConfig,
    pub alerts: AlertConfig,
}

impl Config {
    /// Load and validate a configuration from a JSON file.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Config = serde_json::from_str(&contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make tracking or engagement decisions meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.targeting.validate()?;
        self.alerts.validate()
    }
}

/// Motion model used by every track in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionKind {
    Centroid,
    #[default]
    Kalman,
}

/// Noise tuning for the constant-velocity Kalman model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanParams {
    /// Diagonal of Q
    pub process_noise: f64,
    /// Diagonal of R
    pub measurement_noise: f64,
    /// Diagonal of P for a new track
    pub initial_variance: f64,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            process_noise: 1.0,
            measurement_noise: 1.0,
            initial_variance: 100.0,
        }
    }
}

/// Configuration for the track store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub motion: MotionKind,
    /// A track is pruned once it has gone unmatched for more than this many frames.
    pub max_disappeared: u32,
    /// Consecutive matches needed for Tentative -> Confirmed.
    pub min_hits: u32,
    /// Length of the per-track bounding box history.
    pub history_len: usize,
    /// Euclidean gate for the centroid model, pixels.
    pub centroid_gate_px: f64,
    /// Squared-Mahalanobis gate for the Kalman model.
    pub kalman_gate: f64,
    pub kalman: KalmanParams,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            motion: MotionKind::Kalman,
            max_disappeared: 30,
            min_hits: 3,
            history_len: 32,
            centroid_gate_px: 100.0,
            kalman_gate: CHI2_INV_99_2DOF,
            kalman: KalmanParams::default(),
        }
    }
}

impl TrackerConfig {
    /// Gating threshold matching the configured motion model.
    pub fn gate(&self) -> f64 {
        match self.motion {
            MotionKind::Centroid => self.centroid_gate_px,
            MotionKind::Kalman => self.kalman_gate,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_hits == 0 {
            return Err(ConfigError::invalid_value("tracker.min_hits", "must be > 0"));
        }
        if self.history_len == 0 {
            return Err(ConfigError::invalid_value("tracker.history_len", "must be > 0"));
        }
        if !(self.centroid_gate_px > 0.0) {
            return Err(ConfigError::invalid_value(
                "tracker.centroid_gate_px",
                format!("must be > 0, got {}", self.centroid_gate_px),
            ));
        }
        if !(self.kalman_gate > 0.0) {
            return Err(ConfigError::invalid_value(
                "tracker.kalman_gate",
                format!("must be > 0, got {}", self.kalman_gate),
            ));
        }
        if !(self.kalman.process_noise >= 0.0) || !self.kalman.process_noise.is_finite() {
            return Err(ConfigError::invalid_value(
                "tracker.kalman.process_noise",
                format!("must be finite and >= 0, got {}", self.kalman.process_noise),
            ));
        }
        if !(self.kalman.measurement_noise > 0.0) || !self.kalman.measurement_noise.is_finite() {
            return Err(ConfigError::invalid_value(
                "tracker.kalman.measurement_noise",
                format!("must be finite and > 0, got {}", self.kalman.measurement_noise),
            ));
        }
        if !(self.kalman.initial_variance > 0.0) || !self.kalman.initial_variance.is_finite() {
            return Err(ConfigError::invalid_value(
                "tracker.kalman.initial_variance",
                format!("must be finite and > 0, got {}", self.kalman.initial_variance),
            ));
        }
        Ok(())
    }
}

/// Engagement envelope and camera calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub confidence_threshold: f32,
    /// Consecutive frames above `confidence_threshold` before a track may be Ready.
    pub min_track_frames: u32,
    pub min_range_m: f64,
    pub max_range_m: f64,
    pub max_velocity_mps: f64,
    /// Per-track lockout after an engagement.
    pub engagement_cooldown_s: f64,
    /// System-wide lockout after any engagement.
    pub global_engagement_cooldown_s: f64,
    pub assumed_object_size_m: f64,
    pub focal_length_px: f64,
    pub frame_rate: f64,
    /// Initial arm state. Toggled at runtime only between frames.
    pub armed: bool,
    /// Master switch; arming is refused while false.
    pub engagement_enabled: bool,
    /// Multiplier on velocity for the interception lead point.
    pub lead_factor: f64,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            min_track_frames: 10,
            min_range_m: 5.0,
            max_range_m: 50.0,
            max_velocity_mps: 30.0,
            engagement_cooldown_s: 10.0,
            global_engagement_cooldown_s: 10.0,
            assumed_object_size_m: 0.3,
            focal_length_px: DEFAULT_FOCAL_LENGTH_PX,
            frame_rate: 30.0,
            armed: false,
            engagement_enabled: true,
            lead_factor: 1.2,
        }
    }
}

impl TargetingConfig {
    pub fn engagement_cooldown(&self) -> Duration {
        seconds(self.engagement_cooldown_s)
    }

    pub fn global_engagement_cooldown(&self) -> Duration {
        seconds(self.global_engagement_cooldown_s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(ConfigError::invalid_value(
                "targeting.confidence_threshold",
                format!("must be in (0, 1], got {}", self.confidence_threshold),
            ));
        }
        if self.min_track_frames == 0 {
            return Err(ConfigError::invalid_value(
                "targeting.min_track_frames",
                "must be > 0",
            ));
        }
        if !(self.min_range_m > 0.0) || !self.max_range_m.is_finite() {
            return Err(ConfigError::invalid_value(
                "targeting.min_range_m",
                format!(
                    "range must be positive and finite, got [{}, {}]",
                    self.min_range_m, self.max_range_m
                ),
            ));
        }
        if self.min_range_m >= self.max_range_m {
            return Err(ConfigError::invalid_value(
                "targeting.min_range_m",
                format!(
                    "min_range_m ({}) must be less than max_range_m ({})",
                    self.min_range_m, self.max_range_m
                ),
            ));
        }
        if !(self.max_velocity_mps >= 0.0) || !self.max_velocity_mps.is_finite() {
            return Err(ConfigError::invalid_value(
                "targeting.max_velocity_mps",
                format!("must be finite and >= 0, got {}", self.max_velocity_mps),
            ));
        }
        cooldown_seconds("targeting.engagement_cooldown_s", self.engagement_cooldown_s, false)?;
        cooldown_seconds(
            "targeting.global_engagement_cooldown_s",
            self.global_engagement_cooldown_s,
            false,
        )?;
        positive_finite("targeting.assumed_object_size_m", self.assumed_object_size_m)?;
        positive_finite("targeting.focal_length_px", self.focal_length_px)?;
        positive_finite("targeting.frame_rate", self.frame_rate)?;
        if !(self.lead_factor >= 0.0) || !self.lead_factor.is_finite() {
            return Err(ConfigError::invalid_value(
                "targeting.lead_factor",
                format!("must be finite and >= 0, got {}", self.lead_factor),
            ));
        }
        if self.armed && !self.engagement_enabled {
            return Err(ConfigError::invalid_value(
                "targeting.armed",
                "cannot start armed while engagement is disabled",
            ));
        }
        Ok(())
    }
}

/// Rate limits for the alert dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum gap between two Detection alerts for one track.
    pub per_track_cooldown_s: f64,
    /// Minimum gap between any two alerts.
    pub global_cooldown_s: f64,
    pub engagement_per_track_cooldown_s: f64,
    pub engagement_global_cooldown_s: f64,
    /// Bounded handoff queue to the delivery worker.
    pub queue_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            per_track_cooldown_s: 5.0,
            global_cooldown_s: 1.0,
            engagement_per_track_cooldown_s: 10.0,
            engagement_global_cooldown_s: 10.0,
            queue_capacity: 64,
        }
    }
}

impl AlertConfig {
    pub fn per_track_cooldown(&self) -> Duration {
        seconds(self.per_track_cooldown_s)
    }

    pub fn global_cooldown(&self) -> Duration {
        seconds(self.global_cooldown_s)
    }

    pub fn engagement_per_track_cooldown(&self) -> Duration {
        seconds(self.engagement_per_track_cooldown_s)
    }

    pub fn engagement_global_cooldown(&self) -> Duration {
        seconds(self.engagement_global_cooldown_s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        cooldown_seconds("alerts.per_track_cooldown_s", self.per_track_cooldown_s, true)?;
        cooldown_seconds("alerts.global_cooldown_s", self.global_cooldown_s, true)?;
        cooldown_seconds(
            "alerts.engagement_per_track_cooldown_s",
            self.engagement_per_track_cooldown_s,
            true,
        )?;
        cooldown_seconds(
            "alerts.engagement_global_cooldown_s",
            self.engagement_global_cooldown_s,
            true,
        )?;
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid_value("alerts.queue_capacity", "must be > 0"));
        }
        Ok(())
    }
}

fn positive_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(
            field,
            format!("must be finite and > 0, got {}", value),
        ))
    }
}

/// A cooldown must convert to a `Duration` without overflow. Zero is accepted
/// only where it disables a window.
fn cooldown_seconds(field: &'static str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    if value == 0.0 && !allow_zero {
        return Err(ConfigError::invalid_value(field, "must be > 0, got 0"));
    }
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|e| {
            ConfigError::invalid_value(field, format!("{} is not a valid duration: {}", value, e))
        })
}

// Saturating conversion for configs that skipped `validate`.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_focal_length() {
        assert!((DEFAULT_FOCAL_LENGTH_PX - 528.695).abs() < 1e-2);
        assert_eq!(
            focal_length_px_from_lens(3.04, 3.68, 640),
            DEFAULT_FOCAL_LENGTH_PX
        );
    }

    #[test]
    fn test_inverted_range_envelope_is_fatal() {
        let mut cfg = Config::default();
        cfg.targeting.min_range_m = 50.0;
        cfg.targeting.max_range_m = 50.0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "targeting.min_range_m",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_noise_is_fatal() {
        let mut cfg = Config::default();
        cfg.tracker.kalman.measurement_noise = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracker.kalman.process_noise = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracker.kalman.process_noise = 0.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_cooldown_too_large_for_duration_is_fatal() {
        let mut cfg = Config::default();
        cfg.targeting.engagement_cooldown_s = 1e30;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "targeting.engagement_cooldown_s",
                ..
            }
        ));

        let mut cfg = Config::default();
        cfg.alerts.per_track_cooldown_s = 1e30;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.alerts.global_cooldown_s = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_cooldown_rules() {
        let mut cfg = Config::default();
        cfg.alerts.global_cooldown_s = 0.0;
        assert!(cfg.validate().is_ok());

        cfg.targeting.global_engagement_cooldown_s = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unvalidated_cooldowns_saturate() {
        let mut cfg = Config::default();
        cfg.targeting.engagement_cooldown_s = 1e30;
        cfg.alerts.global_cooldown_s = -1.0;
        assert_eq!(cfg.targeting.engagement_cooldown(), Duration::MAX);
        assert_eq!(cfg.alerts.global_cooldown(), Duration::ZERO);
    }

    #[test]
    fn test_armed_while_disabled_is_fatal() {
        let mut cfg = Config::default();
        cfg.targeting.armed = true;
        cfg.targeting.engagement_enabled = false;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "tracker": { "motion": "centroid", "max_disappeared": 12 },
                "alerts": { "global_cooldown_s": 2.5 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.tracker.motion, MotionKind::Centroid);
        assert_eq!(cfg.tracker.max_disappeared, 12);
        assert_eq!(cfg.tracker.gate(), 100.0);
        assert_eq!(cfg.alerts.global_cooldown(), Duration::from_millis(2500));
        assert_eq!(cfg.targeting.min_track_frames, 10);
    }

    #[test]
    fn test_from_json_missing_file() {
        let err = Config::from_json(Path::new("/nonexistent/intercept.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
