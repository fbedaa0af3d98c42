// CTRV motion model (constant turn rate and velocity magnitude)

use nalgebra::SVector;

use crate::constants::{N_AUG, N_X, YAW_RATE_THRESHOLD};

/// Propagate one augmented sigma point `[px, py, v, yaw, yaw_rate, nu_a, nu_yawdd]`
/// forward by `dt` seconds.
///
/// Uses the closed-form arc when |yaw_rate| exceeds the threshold, otherwise
/// the straight-line limit. Process noise enters quadratically in `dt` for
/// position and heading, linearly for speed and yaw rate.
pub fn ctrv_transition(point: &SVector<f64, N_AUG>, dt: f64) -> SVector<f64, N_X> {
    let px = point[0];
    let py = point[1];
    let v = point[2];
    let yaw = point[3];
    let yaw_rate = point[4];
    let nu_a = point[5];
    let nu_yawdd = point[6];

    let (mut px_p, mut py_p) = if yaw_rate.abs() > YAW_RATE_THRESHOLD {
        let yaw_end = yaw + yaw_rate * dt;
        (
            px + v / yaw_rate * (yaw_end.sin() - yaw.sin()),
            py + v / yaw_rate * (yaw.cos() - yaw_end.cos()),
        )
    } else {
        (px + v * dt * yaw.cos(), py + v * dt * yaw.sin())
    };

    let half_dt2 = 0.5 * dt * dt;
    px_p += half_dt2 * nu_a * yaw.cos();
    py_p += half_dt2 * nu_a * yaw.sin();
    let v_p = v + nu_a * dt;
    let yaw_p = yaw + yaw_rate * dt + half_dt2 * nu_yawdd;
    let yaw_rate_p = yaw_rate + nu_yawdd * dt;

    SVector::<f64, N_X>::from_column_slice(&[px_p, py_p, v_p, yaw_p, yaw_rate_p])
}
