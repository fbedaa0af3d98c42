// Synthetic CTRV scenario generator
//
// Produces a ground-truth trajectory and noisy measurements alternating
// between lidar and radar, for exercising the filter without a data file.

use nalgebra::SVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::config::FilterConfig;
use crate::constants::{N_AUG, N_X, US_PER_SECOND};
use crate::kalman::motion::ctrv_transition;
use crate::kalman::normalize_angle;
use crate::measurement::{Measurement, MeasurementRecord};
use crate::metrics::state_to_cartesian;

/// Parameters of a simulated run
#[derive(Debug, Clone)]
pub struct Scenario {
    /// True initial state [px, py, v, yaw, yaw_rate]
    pub initial_state: [f64; N_X],
    /// Number of measurements to generate
    pub steps: usize,
    /// Time between measurements (microseconds)
    pub interval_us: i64,
    /// Timestamp of the first measurement (microseconds)
    pub start_us: i64,
    /// Seed for measurement noise
    pub seed: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            initial_state: [5.0, 1.0, 5.0, 0.5, 0.2],
            steps: 500,
            interval_us: 50_000,
            start_us: 0,
            seed: 42,
        }
    }
}

/// Generate measurements with ground truth, alternating lidar and radar.
///
/// Noise std-devs are taken from `config` so a filter built from the same
/// config is correctly tuned for the generated data.
pub fn generate(scenario: &Scenario, config: &FilterConfig) -> Vec<MeasurementRecord> {
    let mut rng = StdRng::seed_from_u64(scenario.seed);

    let dt = scenario.interval_us as f64 / US_PER_SECOND;
    let mut truth = SVector::<f64, N_X>::from_column_slice(&scenario.initial_state);
    let mut records = Vec::with_capacity(scenario.steps);

    for step in 0..scenario.steps {
        if step > 0 {
            let mut point = SVector::<f64, N_AUG>::zeros();
            point.fixed_rows_mut::<N_X>(0).copy_from(&truth);
            truth = ctrv_transition(&point, dt);
            truth[3] = normalize_angle(truth[3]);
        }

        let timestamp_us = scenario.start_us + step as i64 * scenario.interval_us;
        let px = truth[0];
        let py = truth[1];

        let measurement = if step % 2 == 0 {
            Measurement::linear(
                px + noise(&mut rng, config.linear_pos_x_std),
                py + noise(&mut rng, config.linear_pos_y_std),
                timestamp_us,
            )
        } else {
            let rho = px.hypot(py);
            let phi = py.atan2(px);
            let rho_dot = if rho > 0.0 {
                (px * truth[2] * truth[3].cos() + py * truth[2] * truth[3].sin()) / rho
            } else {
                0.0
            };
            Measurement::range_bearing(
                rho + noise(&mut rng, config.range_std),
                normalize_angle(phi + noise(&mut rng, config.bearing_std)),
                rho_dot + noise(&mut rng, config.range_rate_std),
                timestamp_us,
            )
        };

        records.push(MeasurementRecord {
            measurement,
            ground_truth: Some(state_to_cartesian(&truth)),
        });
    }

    records
}

/// Zero-mean Gaussian sample; a zero std-dev yields exactly 0
fn noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    let sample: f64 = rng.sample(StandardNormal);
    std_dev * sample
}
