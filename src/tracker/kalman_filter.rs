//! Constant-velocity Kalman filter over centroid state `[cx, cy, vx, vy]`.
//!
//! Matrices are held as ndarray arrays; the 2x2 innovation covariance is
//! factorised with nalgebra's Cholesky decomposition, which doubles as the
//! positive-definiteness check.

use nalgebra::{Cholesky, Matrix2};
use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::config::KalmanParams;

/// Reasons a filter step cannot produce a usable state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFault {
    #[error("innovation covariance is not positive definite")]
    NotPositiveDefinite,
    #[error("filter state is not finite")]
    NonFinite,
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    process_cov: Array2<f64>,
    measurement_cov: Array2<f64>,
    initial_variance: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(&KalmanParams::default())
    }
}

impl KalmanFilter {
    pub fn new(params: &KalmanParams) -> Self {
        let ndim = 2;
        // dt = 1 frame
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            process_cov: Array2::eye(2 * ndim) * params.process_noise,
            measurement_cov: Array2::eye(ndim) * params.measurement_noise,
            initial_variance: params.initial_variance,
        }
    }

    /// State and covariance for a track born at `(cx, cy)` with unknown velocity.
    pub fn initiate(&self, cx: f64, cy: f64) -> (Array1<f64>, Array2<f64>) {
        let mean = Array1::from(vec![cx, cy, 0.0, 0.0]);
        let cov = Array2::eye(4) * self.initial_variance;
        (mean, cov)
    }

    /// x' = F x, P' = F P Fᵀ + Q
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let new_mean = self.motion_mat.dot(mean);
        let new_covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + &self.process_cov;
        (new_mean, new_covariance)
    }

    /// Project the state into measurement space: (H x, H P Hᵀ + R).
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + &self.measurement_cov;
        (mean_proj, covariance_proj)
    }

    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: (f64, f64),
    ) -> Result<(Array1<f64>, Array2<f64>), FilterFault> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let s_inv = innovation_inverse(&projected_cov)?;
        let s_inv = Array2::from_shape_fn((2, 2), |(i, j)| s_inv[(i, j)]);

        let innovation = Array1::from(vec![
            measurement.0 - projected_mean[0],
            measurement.1 - projected_mean[1],
        ]);

        // K = P Hᵀ S⁻¹
        let kalman_gain = covariance.dot(&self.update_mat.t()).dot(&s_inv);

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance =
            (Array2::<f64>::eye(4) - kalman_gain.dot(&self.update_mat)).dot(covariance);

        if !new_mean.iter().chain(new_covariance.iter()).all(|v| v.is_finite()) {
            return Err(FilterFault::NonFinite);
        }
        Ok((new_mean, new_covariance))
    }

    /// Squared Mahalanobis distance between the projected state and a measurement.
    pub fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: (f64, f64),
    ) -> Result<f64, FilterFault> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let s_inv = innovation_inverse(&projected_cov)?;
        let dx = measurement.0 - projected_mean[0];
        let dy = measurement.1 - projected_mean[1];
        let d2 = dx * (s_inv[(0, 0)] * dx + s_inv[(0, 1)] * dy)
            + dy * (s_inv[(1, 0)] * dx + s_inv[(1, 1)] * dy);
        if d2.is_finite() {
            Ok(d2)
        } else {
            Err(FilterFault::NonFinite)
        }
    }
}

pub fn covariance_trace(covariance: &Array2<f64>) -> f64 {
    covariance.diag().sum()
}

fn innovation_inverse(s: &Array2<f64>) -> Result<Matrix2<f64>, FilterFault> {
    let m = Matrix2::new(s[[0, 0]], s[[0, 1]], s[[1, 0]], s[[1, 1]]);
    if !m.iter().all(|v| v.is_finite()) {
        return Err(FilterFault::NonFinite);
    }
    Cholesky::new(m)
        .map(|chol| chol.inverse())
        .ok_or(FilterFault::NotPositiveDefinite)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(process_noise: f64, measurement_noise: f64) -> KalmanParams {
        KalmanParams {
            process_noise,
            measurement_noise,
            initial_variance: 100.0,
        }
    }

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::default();
        let (mean, cov) = kf.initiate(100.0, 200.0);
        assert_eq!(mean.to_vec(), vec![100.0, 200.0, 0.0, 0.0]);
        assert_eq!(covariance_trace(&cov), 400.0);
    }

    #[test]
    fn test_predict_moves_by_velocity() {
        let kf = KalmanFilter::default();
        let mean = Array1::from(vec![10.0, 20.0, 3.0, -2.0]);
        let cov = Array2::eye(4);
        let (predicted, predicted_cov) = kf.predict(&mean, &cov);
        assert_eq!(predicted.to_vec(), vec![13.0, 18.0, 3.0, -2.0]);
        // F I Fᵀ + I: position variance picks up velocity variance.
        assert_eq!(predicted_cov[[0, 0]], 3.0);
        assert_eq!(predicted_cov[[2, 2]], 2.0);
        assert_eq!(predicted_cov[[0, 2]], 1.0);
    }

    #[test]
    fn test_update_pulls_toward_measurement() {
        let kf = KalmanFilter::new(&params(1.0, 1.0));
        let (mean, cov) = kf.initiate(0.0, 0.0);
        let (mean, cov) = kf.predict(&mean, &cov);
        let (updated, updated_cov) = kf.update(&mean, &cov, (10.0, -10.0)).unwrap();
        assert!(updated[0] > 9.0 && updated[0] < 10.0);
        assert!(updated[1] < -9.0 && updated[1] > -10.0);
        assert!(covariance_trace(&updated_cov) < covariance_trace(&cov));
    }

    #[test]
    fn test_velocity_is_learned_from_constant_motion() {
        let kf = KalmanFilter::new(&params(0.01, 0.1));
        let (mut mean, mut cov) = kf.initiate(0.0, 0.0);
        for step in 1..=30 {
            let (m, c) = kf.predict(&mean, &cov);
            let (m, c) = kf.update(&m, &c, (step as f64 * 4.0, step as f64 * -2.0)).unwrap();
            mean = m;
            cov = c;
        }
        assert!((mean[2] - 4.0).abs() < 0.1, "vx = {}", mean[2]);
        assert!((mean[3] + 2.0).abs() < 0.1, "vy = {}", mean[3]);
    }

    #[test]
    fn test_covariance_trace_non_increasing_for_stationary_target() {
        let kf = KalmanFilter::new(&params(0.0, 1.0));
        let (mut mean, mut cov) = kf.initiate(50.0, 50.0);
        let mut last_trace = f64::INFINITY;
        for _ in 0..50 {
            let (m, c) = kf.predict(&mean, &cov);
            let (m, c) = kf.update(&m, &c, (50.0, 50.0)).unwrap();
            let trace = covariance_trace(&c);
            assert!(trace <= last_trace + 1e-9, "{} > {}", trace, last_trace);
            last_trace = trace;
            mean = m;
            cov = c;
        }
        assert!((mean[0] - 50.0).abs() < 1e-9);
        assert!(mean[2].abs() < 1e-9);
    }

    #[test]
    fn test_gating_distance_scales_with_uncertainty() {
        let kf = KalmanFilter::new(&params(1.0, 1.0));
        let mean = Array1::from(vec![0.0, 0.0, 0.0, 0.0]);
        let tight = Array2::eye(4) * 1.0;
        let loose = Array2::eye(4) * 99.0;
        let d_tight = kf.gating_distance(&mean, &tight, (10.0, 0.0)).unwrap();
        let d_loose = kf.gating_distance(&mean, &loose, (10.0, 0.0)).unwrap();
        assert!((d_tight - 50.0).abs() < 1e-9);
        assert!((d_loose - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_definite_innovation_is_reported() {
        let kf = KalmanFilter::new(&params(1.0, 1.0));
        let mean = Array1::from(vec![0.0, 0.0, 0.0, 0.0]);
        let cov = Array2::eye(4) * -5.0;
        assert_eq!(
            kf.update(&mean, &cov, (1.0, 1.0)).unwrap_err(),
            FilterFault::NotPositiveDefinite
        );
        let nan_cov = Array2::from_elem((4, 4), f64::NAN);
        assert_eq!(
            kf.gating_distance(&mean, &nan_cov, (1.0, 1.0)).unwrap_err(),
            FilterFault::NonFinite
        );
    }
}
