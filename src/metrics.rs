// Accuracy and consistency metrics
//
// RMSE of estimates against ground truth, and a running NIS summary checked
// against 95% chi-square thresholds.

use nalgebra::{SVector, Vector4};
use tracing::warn;

use crate::constants::{CHI2_95_2DOF, CHI2_95_3DOF, N_X};
use crate::error::MetricError;
use crate::measurement::Modality;

/// Project a CTRV state onto [px, py, vx, vy] for comparison with ground truth
pub fn state_to_cartesian(state: &SVector<f64, N_X>) -> Vector4<f64> {
    let v = state[2];
    let yaw = state[3];
    Vector4::new(state[0], state[1], v * yaw.cos(), v * yaw.sin())
}

/// Elementwise root-mean-square error between paired estimates and ground truth.
///
/// Fails without computing anything when the inputs are empty or differ in
/// length; callers that want the zero-vector fallback can use
/// `unwrap_or_else(|_| Vector4::zeros())`.
pub fn calculate_rmse(
    estimations: &[Vector4<f64>],
    ground_truth: &[Vector4<f64>],
) -> Result<Vector4<f64>, MetricError> {
    if estimations.len() != ground_truth.len() {
        warn!(
            "RMSE input mismatch: {} estimations, {} ground truth",
            estimations.len(),
            ground_truth.len()
        );
        return Err(MetricError::LengthMismatch {
            estimations: estimations.len(),
            ground_truth: ground_truth.len(),
        });
    }
    if estimations.is_empty() {
        warn!("RMSE requested for an empty estimate sequence");
        return Err(MetricError::Empty);
    }

    let mut sum = Vector4::zeros();
    for (estimate, truth) in estimations.iter().zip(ground_truth) {
        let residual = estimate - truth;
        sum += residual.component_mul(&residual);
    }
    Ok((sum / estimations.len() as f64).map(f64::sqrt))
}

/// Running NIS statistics for both sensors
#[derive(Debug, Clone, Default)]
pub struct NisSummary {
    linear: Vec<f64>,
    range_bearing: Vec<f64>,
}

impl NisSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, modality: Modality, nis: f64) {
        match modality {
            Modality::Linear => self.linear.push(nis),
            Modality::RangeBearing => self.range_bearing.push(nis),
        }
    }

    pub fn count(&self, modality: Modality) -> usize {
        self.samples(modality).len()
    }

    /// Fraction of samples above the 95% chi-square threshold for the
    /// sensor's measurement dimension. A consistent filter sits near 0.05.
    pub fn fraction_above_95(&self, modality: Modality) -> Option<f64> {
        let samples = self.samples(modality);
        if samples.is_empty() {
            return None;
        }
        let threshold = match modality {
            Modality::Linear => CHI2_95_2DOF,
            Modality::RangeBearing => CHI2_95_3DOF,
        };
        let above = samples.iter().filter(|&&nis| nis > threshold).count();
        Some(above as f64 / samples.len() as f64)
    }

    pub fn mean(&self, modality: Modality) -> Option<f64> {
        let samples = self.samples(modality);
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    fn samples(&self, modality: Modality) -> &[f64] {
        match modality {
            Modality::Linear => &self.linear,
            Modality::RangeBearing => &self.range_bearing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmse_empty() {
        let result = calculate_rmse(&[], &[]);
        assert_eq!(result, Err(MetricError::Empty));
        assert_eq!(result.unwrap_or_else(|_| Vector4::zeros()), Vector4::zeros());
    }

    #[test]
    fn test_rmse_length_mismatch() {
        let a = vec![Vector4::new(1.0, 2.0, 3.0, 4.0)];
        let result = calculate_rmse(&a, &[]);
        assert_eq!(
            result,
            Err(MetricError::LengthMismatch {
                estimations: 1,
                ground_truth: 0
            })
        );
    }

    #[test]
    fn test_rmse_identical_is_zero() {
        let v = Vector4::new(1.5, -2.0, 0.3, 9.0);
        assert_eq!(calculate_rmse(&[v], &[v]).unwrap(), Vector4::zeros());
    }

    #[test]
    fn test_rmse_values() {
        let estimations = vec![
            Vector4::new(1.0, 0.0, 0.0, 0.0),
            Vector4::new(3.0, 0.0, 2.0, 0.0),
        ];
        let truth = vec![Vector4::zeros(), Vector4::zeros()];
        let rmse = calculate_rmse(&estimations, &truth).unwrap();
        assert!((rmse[0] - 5.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(rmse[1], 0.0);
        assert!((rmse[2] - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_state_to_cartesian() {
        let yaw = std::f64::consts::FRAC_PI_2;
        let state = SVector::<f64, N_X>::from_column_slice(&[1.0, 2.0, 2.0, yaw, 0.0]);
        let c = state_to_cartesian(&state);
        assert_eq!(c[0], 1.0);
        assert_eq!(c[1], 2.0);
        assert!(c[2].abs() < 1e-12);
        assert!((c[3] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nis_summary() {
        let mut summary = NisSummary::new();
        assert_eq!(summary.fraction_above_95(Modality::Linear), None);

        for nis in [1.0, 2.0, 3.0, 10.0] {
            summary.record(Modality::Linear, nis);
        }
        summary.record(Modality::RangeBearing, 7.0);

        assert_eq!(summary.count(Modality::Linear), 4);
        assert_eq!(summary.fraction_above_95(Modality::Linear), Some(0.25));
        assert_eq!(summary.fraction_above_95(Modality::RangeBearing), Some(0.0));
        assert_eq!(summary.mean(Modality::Linear), Some(4.0));
    }
}
