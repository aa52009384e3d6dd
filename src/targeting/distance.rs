//! Range and speed estimation from apparent size (pinhole camera model).
//!
//! ```text
//! distance_m = assumed_object_size_m * focal_length_px / bbox_size_px
//! ```
//!
//! `bbox_size_px` is the larger side of the box, which errs towards a
//! shorter range for foreshortened targets.

use crate::config::TargetingConfig;
use crate::tracker::Rect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEstimator {
    assumed_object_size_m: f64,
    focal_length_px: f64,
    frame_rate: f64,
}

impl RangeEstimator {
    pub fn new(assumed_object_size_m: f64, focal_length_px: f64, frame_rate: f64) -> Self {
        Self {
            assumed_object_size_m,
            focal_length_px,
            frame_rate,
        }
    }

    pub fn from_config(config: &TargetingConfig) -> Self {
        Self::new(
            config.assumed_object_size_m,
            config.focal_length_px,
            config.frame_rate,
        )
    }

    /// Estimated range in meters; +inf for a degenerate box.
    pub fn distance_m(&self, bbox: &Rect) -> f64 {
        let size_px = bbox.max_side() as f64;
        if !(size_px > 0.0) {
            return f64::INFINITY;
        }
        self.assumed_object_size_m * self.focal_length_px / size_px
    }

    /// Convert an image-plane velocity (pixels/frame) to m/s at the given range.
    pub fn velocity_mps(&self, velocity_px: (f64, f64), distance_m: f64) -> f64 {
        let speed_px = velocity_px.0.hypot(velocity_px.1);
        let meters_per_px = distance_m / self.focal_length_px;
        speed_px * self.frame_rate * meters_per_px
    }
}

/// Predicted interception point: centroid advanced by velocity times `lead_factor`.
pub fn lead_point(center: (f64, f64), velocity_px: (f64, f64), lead_factor: f64) -> (f64, f64) {
    (
        center.0 + velocity_px.0 * lead_factor,
        center.1 + velocity_px.1 * lead_factor,
    )
}
