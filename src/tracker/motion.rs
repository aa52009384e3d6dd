//! Per-track motion models.
//!
//! The set of models is closed, so they are a plain enum chosen once when the
//! track store is built. Both variants answer the same questions: where is
//! the object now, how fast is it moving, and how far is a measurement from
//! where we expected it.

use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::config::MotionKind;
use crate::tracker::kalman_filter::{FilterFault, KalmanFilter};

#[derive(Debug, Clone)]
pub enum MotionModel {
    Centroid(CentroidMotion),
    Kalman(KalmanMotion),
}

/// Holds the last matched centroid; prediction does not move it.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidMotion {
    centroid: (f64, f64),
    /// Displacement between the last two matched centroids, pixels/frame.
    velocity: (f64, f64),
}

#[derive(Debug, Clone)]
pub struct KalmanMotion {
    filter: Arc<KalmanFilter>,
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl MotionModel {
    pub fn new(kind: MotionKind, filter: &Arc<KalmanFilter>, center: (f64, f64)) -> Self {
        match kind {
            MotionKind::Centroid => Self::Centroid(CentroidMotion {
                centroid: center,
                velocity: (0.0, 0.0),
            }),
            MotionKind::Kalman => {
                let (mean, covariance) = filter.initiate(center.0, center.1);
                Self::Kalman(KalmanMotion {
                    filter: Arc::clone(filter),
                    mean,
                    covariance,
                })
            }
        }
    }

    pub fn kind(&self) -> MotionKind {
        match self {
            Self::Centroid(_) => MotionKind::Centroid,
            Self::Kalman(_) => MotionKind::Kalman,
        }
    }

    /// Advance one frame without a measurement.
    pub fn predict(&mut self) {
        match self {
            Self::Centroid(_) => {}
            Self::Kalman(k) => {
                let (mean, covariance) = k.filter.predict(&k.mean, &k.covariance);
                k.mean = mean;
                k.covariance = covariance;
            }
        }
    }

    /// Correct the state with a matched measurement. On failure the previous
    /// state is left untouched.
    pub fn update(&mut self, center: (f64, f64)) -> Result<(), FilterFault> {
        match self {
            Self::Centroid(c) => {
                c.velocity = (center.0 - c.centroid.0, center.1 - c.centroid.1);
                c.centroid = center;
                Ok(())
            }
            Self::Kalman(k) => {
                let (mean, covariance) = k.filter.update(&k.mean, &k.covariance, center)?;
                k.mean = mean;
                k.covariance = covariance;
                Ok(())
            }
        }
    }

    pub fn position(&self) -> (f64, f64) {
        match self {
            Self::Centroid(c) => c.centroid,
            Self::Kalman(k) => (k.mean[0], k.mean[1]),
        }
    }

    /// Velocity in pixels per frame.
    pub fn velocity(&self) -> (f64, f64) {
        match self {
            Self::Centroid(c) => c.velocity,
            Self::Kalman(k) => (k.mean[2], k.mean[3]),
        }
    }

    pub fn speed_px(&self) -> f64 {
        let (vx, vy) = self.velocity();
        vx.hypot(vy)
    }

    /// Association cost of a measurement: Euclidean pixels for the centroid
    /// model, squared Mahalanobis distance for the Kalman model.
    pub fn cost(&self, center: (f64, f64)) -> Result<f64, FilterFault> {
        match self {
            Self::Centroid(c) => Ok((center.0 - c.centroid.0).hypot(center.1 - c.centroid.1)),
            Self::Kalman(k) => k.filter.gating_distance(&k.mean, &k.covariance, center),
        }
    }

    pub fn covariance(&self) -> Option<&Array2<f64>> {
        match self {
            Self::Centroid(_) => None,
            Self::Kalman(k) => Some(&k.covariance),
        }
    }
}

#[cfg(test)]
impl KalmanMotion {
    pub(crate) fn corrupt_covariance(&mut self) {
        self.covariance.fill(f64::NAN);
    }
}
