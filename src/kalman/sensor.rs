// Measurement models for the two supported sensors

use nalgebra::{Matrix2, Matrix3, SVector, Vector2, Vector3};

use crate::config::FilterConfig;
use crate::constants::{N_X, RADIUS_FLOOR};

/// Lidar: identity projection of the position components
pub fn linear_projection(state: &SVector<f64, N_X>) -> Vector2<f64> {
    Vector2::new(state[0], state[1])
}

/// Radar: `[rho, phi, rho_dot]` seen from the origin.
///
/// The range-rate divisor is floored at `RADIUS_FLOOR` so a sigma point at
/// the sensor origin yields finite values. `atan2(0, 0)` is 0.
pub fn range_bearing_projection(state: &SVector<f64, N_X>) -> Vector3<f64> {
    let px = state[0];
    let py = state[1];
    let v = state[2];
    let yaw = state[3];

    let rho = px.hypot(py);
    let phi = py.atan2(px);
    let rho_dot = (px * v * yaw.cos() + py * v * yaw.sin()) / rho.max(RADIUS_FLOOR);
    Vector3::new(rho, phi, rho_dot)
}

/// Lidar noise covariance diag(std_px^2, std_py^2)
pub fn linear_noise(config: &FilterConfig) -> Matrix2<f64> {
    Matrix2::from_diagonal(&Vector2::new(
        config.linear_pos_x_std.powi(2),
        config.linear_pos_y_std.powi(2),
    ))
}

/// Radar noise covariance diag(std_rho^2, std_phi^2, std_rho_dot^2)
pub fn range_bearing_noise(config: &FilterConfig) -> Matrix3<f64> {
    Matrix3::from_diagonal(&Vector3::new(
        config.range_std.powi(2),
        config.bearing_std.powi(2),
        config.range_rate_std.powi(2),
    ))
}
