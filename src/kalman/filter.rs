// CTRV unscented Kalman filter for a single tracked object
//
// Owns the belief (mean + covariance), fuses lidar and radar measurements
// with a predict-then-update cycle per measurement, and keeps the NIS of the
// latest update of each sensor for consistency monitoring.

use nalgebra::{Matrix2, Matrix3, SMatrix, SVector, Vector2, Vector3};
use tracing::{debug, info, warn};

use super::motion::ctrv_transition;
use super::sensor::{
    linear_noise, linear_projection, range_bearing_noise, range_bearing_projection,
};
use super::unscented::{
    angle_residual, augmented_sigma_points, cross_covariance, normalize_angle, points2moments,
    sigma_weights, transform_points, Moments, SigmaMatrix, Weights,
};
use crate::config::FilterConfig;
use crate::constants::*;
use crate::error::{ConfigError, EstimatorError};
use crate::measurement::{Measurement, Modality, Reading};

/// State vector: [px, py, v, yaw, yaw_rate]
pub type StateVector = SVector<f64, N_X>;

/// State covariance (5x5)
pub type StateCovariance = SMatrix<f64, N_X, N_X>;

/// What a call to [`UnscentedKalmanFilter::process_measurement`] did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessOutcome {
    /// First accepted measurement seeded the belief; no predict/update ran
    Initialized,
    /// Predict and update ran; carries the NIS of this update
    Updated { nis: f64 },
    /// The measurement's sensor is disabled
    Skipped,
}

/// Unscented Kalman filter with a CTRV motion model
///
/// Measurements must arrive in non-decreasing timestamp order. The filter
/// neither buffers nor reorders; a backwards timestamp produces a negative
/// `dt`. Not safe to share between threads without external locking.
#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter {
    config: FilterConfig,
    weights: Weights,
    linear_noise: Matrix2<f64>,
    range_bearing_noise: Matrix3<f64>,

    initialized: bool,
    timestamp_us: i64,
    mean: StateVector,
    covariance: StateCovariance,

    // State sigma points from the latest prediction, consumed by the update
    sigma_points_pred: SigmaMatrix<N_X>,

    nis_linear: f64,
    nis_range_bearing: f64,
}

impl UnscentedKalmanFilter {
    /// Create an uninitialized filter
    pub fn new(config: FilterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let linear_noise = linear_noise(&config);
        let range_bearing_noise = range_bearing_noise(&config);
        let (mean, covariance) = prior(&config);
        Ok(Self {
            weights: sigma_weights(),
            linear_noise,
            range_bearing_noise,
            initialized: false,
            timestamp_us: 0,
            mean,
            covariance,
            sigma_points_pred: SigmaMatrix::<N_X>::zeros(),
            nis_linear: 0.0,
            nis_range_bearing: 0.0,
            config,
        })
    }

    /// Return to the uninitialized state. The next accepted measurement
    /// re-seeds the belief.
    pub fn reset(&mut self) {
        self.initialized = false;
        self.timestamp_us = 0;
        (self.mean, self.covariance) = prior(&self.config);
        self.sigma_points_pred = SigmaMatrix::<N_X>::zeros();
        self.nis_linear = 0.0;
        self.nis_range_bearing = 0.0;
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Timestamp of the last processed measurement (microseconds)
    pub fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    pub fn mean(&self) -> &StateVector {
        &self.mean
    }

    pub fn covariance(&self) -> &StateCovariance {
        &self.covariance
    }

    /// NIS of the latest lidar update
    pub fn nis_linear(&self) -> f64 {
        self.nis_linear
    }

    /// NIS of the latest radar update
    pub fn nis_range_bearing(&self) -> f64 {
        self.nis_range_bearing
    }

    /// Whether measurements of this modality are processed
    pub fn accepts(&self, modality: Modality) -> bool {
        match modality {
            Modality::Linear => self.config.enable_linear_sensor,
            Modality::RangeBearing => self.config.enable_nonlinear_sensor,
        }
    }

    /// Fuse one measurement.
    ///
    /// The first accepted measurement initializes the belief. Every later one
    /// runs `predict(dt)` followed by the sensor-specific update.
    ///
    /// `CovarianceNotPositiveDefinite` leaves the belief as it was before the
    /// call; the session should be [`reset`](Self::reset). `SingularInnovation`
    /// keeps the prediction and skips the correction.
    pub fn process_measurement(
        &mut self,
        measurement: &Measurement,
    ) -> Result<ProcessOutcome, EstimatorError> {
        let modality = measurement.modality();
        if !self.accepts(modality) {
            debug!("Skipping {:?} measurement: sensor disabled", modality);
            return Ok(ProcessOutcome::Skipped);
        }

        if !self.initialized {
            self.initialize(measurement);
            return Ok(ProcessOutcome::Initialized);
        }

        let elapsed_us = measurement.timestamp_us.saturating_sub(self.timestamp_us);
        let dt = elapsed_us as f64 / US_PER_SECOND;
        self.predict(dt)?;
        self.timestamp_us = measurement.timestamp_us;

        let nis = match measurement.reading {
            Reading::Linear(z) => self.update_linear(&z)?,
            Reading::RangeBearing(z) => self.update_range_bearing(&z)?,
        };
        Ok(ProcessOutcome::Updated { nis })
    }

    /// Seed the belief from the first measurement
    fn initialize(&mut self, measurement: &Measurement) {
        (self.mean, self.covariance) = prior(&self.config);

        // Speed and heading are not observed instantaneously; keep the prior
        let position = measurement.position();
        self.mean[0] = position[0];
        self.mean[1] = position[1];

        self.timestamp_us = measurement.timestamp_us;
        self.initialized = true;
        info!(
            "Initialized from {:?} at ({:.3}, {:.3}), t={}us",
            measurement.modality(),
            position[0],
            position[1],
            measurement.timestamp_us
        );
    }

    /// Propagate the belief `dt` seconds through the CTRV model.
    ///
    /// Stores the propagated sigma points for the following update.
    pub fn predict(&mut self, dt: f64) -> Result<(), EstimatorError> {
        let state = Moments {
            mean: self.mean,
            covariance: self.covariance,
        };
        let augmented = augmented_sigma_points(
            &state,
            self.config.accel_noise_std,
            self.config.yaw_accel_noise_std,
        )?;

        let predicted: SigmaMatrix<N_X> = transform_points(&augmented, |p| ctrv_transition(p, dt));
        let moments = points2moments(
            &predicted,
            &self.weights,
            angle_residual::<N_X>(YAW_INDEX),
            None,
        );

        self.sigma_points_pred = predicted;
        self.mean = moments.mean;
        self.covariance = moments.covariance;
        debug!("Predicted dt={:.6}s mean={:?}", dt, self.mean.as_slice());
        Ok(())
    }

    /// Correct the predicted belief with a lidar position `[px, py]`.
    ///
    /// Uses the sigma points of the latest [`predict`](Self::predict).
    /// Returns the NIS of the update.
    pub fn update_linear(&mut self, z: &Vector2<f64>) -> Result<f64, EstimatorError> {
        let noise = self.linear_noise;
        let nis = self.correct(z, linear_projection, noise, None, "linear")?;
        self.nis_linear = nis;
        Ok(nis)
    }

    /// Correct the predicted belief with a radar reading `[rho, phi, rho_dot]`.
    ///
    /// Bearing residuals are wrapped into (-pi, pi]. Returns the NIS.
    pub fn update_range_bearing(&mut self, z: &Vector3<f64>) -> Result<f64, EstimatorError> {
        let noise = self.range_bearing_noise;
        let nis = self.correct(
            z,
            range_bearing_projection,
            noise,
            Some(BEARING_INDEX),
            "range-bearing",
        )?;
        self.nis_range_bearing = nis;
        Ok(nis)
    }

    fn correct<const M: usize, F>(
        &mut self,
        z: &SVector<f64, M>,
        project: F,
        noise: SMatrix<f64, M, M>,
        angle_index: Option<usize>,
        sensor: &'static str,
    ) -> Result<f64, EstimatorError>
    where
        F: Fn(&StateVector) -> SVector<f64, M>,
    {
        let z_residual = move |mut diff: SVector<f64, M>| {
            if let Some(i) = angle_index {
                diff[i] = normalize_angle(diff[i]);
            }
            diff
        };

        let z_points: SigmaMatrix<M> = transform_points(&self.sigma_points_pred, project);
        let z_pred = points2moments(&z_points, &self.weights, z_residual, Some(&noise));

        let cross = cross_covariance(
            &self.sigma_points_pred,
            &self.mean,
            angle_residual::<N_X>(YAW_INDEX),
            &z_points,
            &z_pred.mean,
            z_residual,
            &self.weights,
        );

        let s_inv = invert_innovation_covariance(z_pred.covariance, sensor)?;
        let gain = cross * s_inv;
        let innovation = z_residual(z - z_pred.mean);
        let nis = (innovation.transpose() * s_inv * innovation)[(0, 0)];

        self.mean += gain * innovation;
        self.mean[YAW_INDEX] = normalize_angle(self.mean[YAW_INDEX]);

        let covariance = self.covariance - gain * z_pred.covariance * gain.transpose();
        self.covariance = (covariance + covariance.transpose()) * 0.5;

        debug!("{} update NIS={:.4}", sensor, nis);
        Ok(nis)
    }
}

/// Prior belief: configured mean and diagonal covariance
fn prior(config: &FilterConfig) -> (StateVector, StateCovariance) {
    let mean = StateVector::from_column_slice(&config.prior_mean);
    let variance = StateVector::from_column_slice(&config.prior_variance);
    (mean, StateCovariance::from_diagonal(&variance))
}

/// Invert the innovation covariance, regularizing it once when singular or
/// ill-conditioned
fn invert_innovation_covariance<const M: usize>(
    s: SMatrix<f64, M, M>,
    sensor: &'static str,
) -> Result<SMatrix<f64, M, M>, EstimatorError> {
    if let Some(inverse) = well_conditioned_inverse(&s) {
        return Ok(inverse);
    }

    let jitter = INNOVATION_JITTER.max(s.norm() * INNOVATION_RELATIVE_JITTER);
    warn!("{} innovation covariance is ill-conditioned, adding jitter {:e}", sensor, jitter);
    let jittered = s + SMatrix::<f64, M, M>::identity() * jitter;
    well_conditioned_inverse(&jittered).ok_or(EstimatorError::SingularInnovation { sensor })
}

/// Inverse of `s` when it exists, is finite and the condition estimate
/// stays below `INNOVATION_MAX_CONDITION`
fn well_conditioned_inverse<const M: usize>(s: &SMatrix<f64, M, M>) -> Option<SMatrix<f64, M, M>> {
    let inverse = s.try_inverse()?;
    if !inverse.iter().all(|x| x.is_finite()) {
        return None;
    }
    let condition = s.norm() * inverse.norm();
    (condition.is_finite() && condition <= INNOVATION_MAX_CONDITION).then_some(inverse)
}
