// Unscented transform building blocks
//
// Sigma point generation for the noise-augmented state, and the weighted
// mean / covariance / cross-covariance recovery shared by the prediction and
// both measurement updates. Sigma points are stored one per column.

use std::f64::consts::PI;

use nalgebra::{SMatrix, SVector};

use crate::constants::{LAMBDA, N_AUG, N_SIGMA, N_X};
use crate::error::EstimatorError;

/// Sigma points of dimension D, one per column
pub type SigmaMatrix<const D: usize> = SMatrix<f64, D, N_SIGMA>;

/// Sigma point weights (identical for mean and covariance)
pub type Weights = SVector<f64, N_SIGMA>;

/// Mean and covariance of a D-dimensional Gaussian
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments<const D: usize> {
    pub mean: SVector<f64, D>,
    pub covariance: SMatrix<f64, D, D>,
}

/// Wrap an angle into (-pi, pi]
///
/// Non-finite input is returned unchanged.
pub fn normalize_angle(mut angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    // Stepping by 2*pi stalls once it drops below the float spacing
    if angle.abs() > 4.0 * PI {
        angle = (angle + PI).rem_euclid(2.0 * PI) - PI;
    }
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Residual that wraps component `index` as an angle
pub fn angle_residual<const D: usize>(index: usize) -> impl Fn(SVector<f64, D>) -> SVector<f64, D> {
    move |mut diff| {
        diff[index] = normalize_angle(diff[index]);
        diff
    }
}

/// Plain vector difference, for spaces without angular components
pub fn linear_residual<const D: usize>(diff: SVector<f64, D>) -> SVector<f64, D> {
    diff
}

/// Sigma point weights: lambda / (lambda + n_aug) for the central point,
/// 0.5 / (lambda + n_aug) for the rest. They sum to one.
pub fn sigma_weights() -> Weights {
    let spread = LAMBDA + N_AUG as f64;
    let mut weights = Weights::from_element(0.5 / spread);
    weights[0] = LAMBDA / spread;
    weights
}

/// Generate 2 * n_aug + 1 sigma points from the state belief augmented with
/// zero-mean longitudinal and yaw acceleration noise.
///
/// Fails when the augmented covariance is not positive definite.
pub fn augmented_sigma_points(
    state: &Moments<N_X>,
    std_a: f64,
    std_yawdd: f64,
) -> Result<SigmaMatrix<N_AUG>, EstimatorError> {
    let mut mean_aug = SVector::<f64, N_AUG>::zeros();
    mean_aug.fixed_rows_mut::<N_X>(0).copy_from(&state.mean);

    let mut cov_aug = SMatrix::<f64, N_AUG, N_AUG>::zeros();
    cov_aug
        .fixed_view_mut::<N_X, N_X>(0, 0)
        .copy_from(&state.covariance);
    cov_aug[(N_X, N_X)] = std_a * std_a;
    cov_aug[(N_X + 1, N_X + 1)] = std_yawdd * std_yawdd;

    let sqrt_cov = cov_aug
        .cholesky()
        .ok_or(EstimatorError::CovarianceNotPositiveDefinite)?
        .l();
    let scale = (LAMBDA + N_AUG as f64).sqrt();

    let mut points = SigmaMatrix::<N_AUG>::zeros();
    points.set_column(0, &mean_aug);
    for i in 0..N_AUG {
        let offset = sqrt_cov.column(i) * scale;
        points.set_column(i + 1, &(mean_aug + offset));
        points.set_column(i + 1 + N_AUG, &(mean_aug - offset));
    }
    Ok(points)
}

/// Weighted mean of the sigma points.
///
/// Accumulated as offsets from the central point passed through `residual`,
/// so angular components that straddle the +/-pi seam average correctly.
/// With a plain difference this equals the ordinary weighted sum.
pub fn weighted_mean<const D: usize, F>(
    points: &SigmaMatrix<D>,
    weights: &Weights,
    residual: F,
) -> SVector<f64, D>
where
    F: Fn(SVector<f64, D>) -> SVector<f64, D>,
{
    let center: SVector<f64, D> = points.column(0).into_owned();
    let mut offset = SVector::<f64, D>::zeros();
    for i in 1..N_SIGMA {
        offset += residual(points.column(i) - &center) * weights[i];
    }
    center + offset
}

/// Weighted covariance of the sigma points around `mean`.
///
/// `residual` post-processes each (point - mean) difference, e.g. to wrap
/// angular components before they enter the outer product.
pub fn weighted_covariance<const D: usize, F>(
    points: &SigmaMatrix<D>,
    mean: &SVector<f64, D>,
    weights: &Weights,
    residual: F,
) -> SMatrix<f64, D, D>
where
    F: Fn(SVector<f64, D>) -> SVector<f64, D>,
{
    let mut covariance = SMatrix::<f64, D, D>::zeros();
    for i in 0..N_SIGMA {
        let diff = residual(points.column(i) - mean);
        covariance += (diff * diff.transpose()) * weights[i];
    }
    covariance
}

/// Recover mean and covariance from sigma points, adding optional noise
pub fn points2moments<const D: usize, F>(
    points: &SigmaMatrix<D>,
    weights: &Weights,
    residual: F,
    noise: Option<&SMatrix<f64, D, D>>,
) -> Moments<D>
where
    F: Fn(SVector<f64, D>) -> SVector<f64, D>,
{
    let mean = weighted_mean(points, weights, &residual);
    let mut covariance = weighted_covariance(points, &mean, weights, residual);
    if let Some(noise) = noise {
        covariance += noise;
    }
    Moments { mean, covariance }
}

/// Cross-covariance between two sigma point sets sharing the same weights
pub fn cross_covariance<const A: usize, const B: usize, FA, FB>(
    points_a: &SigmaMatrix<A>,
    mean_a: &SVector<f64, A>,
    residual_a: FA,
    points_b: &SigmaMatrix<B>,
    mean_b: &SVector<f64, B>,
    residual_b: FB,
    weights: &Weights,
) -> SMatrix<f64, A, B>
where
    FA: Fn(SVector<f64, A>) -> SVector<f64, A>,
    FB: Fn(SVector<f64, B>) -> SVector<f64, B>,
{
    let mut cross = SMatrix::<f64, A, B>::zeros();
    for i in 0..N_SIGMA {
        let diff_a = residual_a(points_a.column(i) - mean_a);
        let diff_b = residual_b(points_b.column(i) - mean_b);
        cross += (diff_a * diff_b.transpose()) * weights[i];
    }
    cross
}

/// Map every sigma point through `f`
pub fn transform_points<const I: usize, const O: usize, F>(
    points: &SigmaMatrix<I>,
    f: F,
) -> SigmaMatrix<O>
where
    F: Fn(&SVector<f64, I>) -> SVector<f64, O>,
{
    let mut out = SigmaMatrix::<O>::zeros();
    for i in 0..N_SIGMA {
        let point: SVector<f64, I> = points.column(i).into_owned();
        out.set_column(i, &f(&point));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::YAW_INDEX;

    fn test_state() -> Moments<N_X> {
        Moments {
            mean: SVector::<f64, N_X>::from_column_slice(&[1.0, 2.0, 3.0, 0.5, 0.1]),
            covariance: SMatrix::<f64, N_X, N_X>::from_diagonal(
                &SVector::<f64, N_X>::from_column_slice(&[0.15, 0.15, 1.0, 1.0, 1.0]),
            ),
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let weights = sigma_weights();
        assert!((weights.sum() - 1.0).abs() < 1e-12);
        assert!((weights[0] - LAMBDA / (LAMBDA + N_AUG as f64)).abs() < 1e-12);
        for i in 1..N_SIGMA {
            assert!((weights[i] - weights[1]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(2.0 * PI + 1.0) - 1.0).abs() < 1e-12);
        assert!((normalize_angle(-3.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((normalize_angle(0.25) - 0.25).abs() < 1e-15);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!(normalize_angle(f64::NAN).is_nan());
        assert!(normalize_angle(f64::INFINITY).is_infinite());
    }

    #[test]
    fn test_normalize_huge_angle() {
        for angle in [1e18, -1e18, 1e300, f64::MAX, f64::MIN, 1e6 + 0.5] {
            let wrapped = normalize_angle(angle);
            assert!(wrapped > -PI && wrapped <= PI, "{} -> {}", angle, wrapped);
        }
        // Exact reduction for moderately large inputs
        assert!((normalize_angle(1000.0 * PI + 0.25) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_angle_idempotent() {
        for k in -40..=40 {
            let angle = k as f64 * 0.37;
            let once = normalize_angle(angle);
            let twice = normalize_angle(once);
            assert!(once > -PI && once <= PI, "{} -> {}", angle, once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_augmented_sigma_points_layout() {
        let state = test_state();
        let points = augmented_sigma_points(&state, 2.0, 0.5).unwrap();

        // Central point is the augmented mean
        for i in 0..N_X {
            assert!((points[(i, 0)] - state.mean[i]).abs() < 1e-12);
        }
        assert_eq!(points[(N_X, 0)], 0.0);
        assert_eq!(points[(N_X + 1, 0)], 0.0);

        // Points come in symmetric pairs around the mean
        let center = points.column(0).into_owned();
        for i in 1..=N_AUG {
            let plus = points.column(i) - &center;
            let minus = points.column(i + N_AUG) - &center;
            assert!((plus + minus).norm() < 1e-12);
        }

        // Noise dimensions are spread by sqrt(lambda + n_aug) * std
        let scale = (LAMBDA + N_AUG as f64).sqrt();
        assert!((points[(N_X, N_X + 1)] - scale * 2.0).abs() < 1e-12);
        assert!((points[(N_X + 1, N_X + 2)] - scale * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_augmented_sigma_points_reject_indefinite_covariance() {
        let mut state = test_state();
        state.covariance[(2, 2)] = -1.0;
        assert_eq!(
            augmented_sigma_points(&state, 2.0, 2.0),
            Err(EstimatorError::CovarianceNotPositiveDefinite)
        );
    }

    #[test]
    fn test_points2moments_recovers_state() {
        let state = test_state();
        let points = augmented_sigma_points(&state, 2.0, 2.0).unwrap();
        let state_points: SigmaMatrix<N_X> = points.fixed_rows::<N_X>(0).into_owned();

        let moments = points2moments(&state_points, &sigma_weights(), linear_residual, None);
        for i in 0..N_X {
            assert!((moments.mean[i] - state.mean[i]).abs() < 1e-10);
            for j in 0..N_X {
                assert!(
                    (moments.covariance[(i, j)] - state.covariance[(i, j)]).abs() < 1e-10,
                    "cov mismatch at ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn test_angle_residual_wraps_only_selected_component() {
        let residual = angle_residual::<N_X>(YAW_INDEX);
        let diff = SVector::<f64, N_X>::from_column_slice(&[7.0, -7.0, 7.0, 2.0 * PI + 0.1, 7.0]);
        let wrapped = residual(diff);
        assert_eq!(wrapped[0], 7.0);
        assert_eq!(wrapped[1], -7.0);
        assert!((wrapped[YAW_INDEX] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_linear_transform_scales_covariance() {
        let state = test_state();
        let points = augmented_sigma_points(&state, 1.0, 1.0).unwrap();
        let doubled: SigmaMatrix<2> =
            transform_points(&points, |x| nalgebra::Vector2::new(2.0 * x[0], 2.0 * x[1]));

        let moments = points2moments(&doubled, &sigma_weights(), linear_residual, None);
        assert!((moments.mean[0] - 2.0).abs() < 1e-10);
        assert!((moments.mean[1] - 4.0).abs() < 1e-10);
        assert!((moments.covariance[(0, 0)] - 4.0 * 0.15).abs() < 1e-10);
        assert!((moments.covariance[(1, 1)] - 4.0 * 0.15).abs() < 1e-10);
    }

    #[test]
    fn test_cross_covariance_of_identity_projection() {
        let state = test_state();
        let points = augmented_sigma_points(&state, 1.0, 1.0).unwrap();
        let state_points: SigmaMatrix<N_X> = points.fixed_rows::<N_X>(0).into_owned();
        let projected: SigmaMatrix<2> = state_points.fixed_rows::<2>(0).into_owned();
        let weights = sigma_weights();

        let state_mean = weighted_mean(&state_points, &weights, linear_residual);
        let z_mean = weighted_mean(&projected, &weights, linear_residual);
        let cross = cross_covariance(
            &state_points,
            &state_mean,
            linear_residual,
            &projected,
            &z_mean,
            linear_residual,
            &weights,
        );
        // Cross-covariance of a state with its own position equals the position columns of P
        for i in 0..N_X {
            for j in 0..2 {
                assert!((cross[(i, j)] - state.covariance[(i, j)]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_weighted_mean_across_angle_seam() {
        // Bearings on both sides of +/-pi average to ~pi, not ~0
        let mut points = SigmaMatrix::<1>::zeros();
        points[(0, 0)] = PI - 0.05;
        for i in 1..N_SIGMA {
            points[(0, i)] = if i % 2 == 0 { PI - 0.1 } else { -PI + 0.1 };
        }
        let weights = sigma_weights();
        let mean = weighted_mean(&points, &weights, angle_residual::<1>(0));
        assert!(normalize_angle(mean[0] - PI).abs() < 0.1, "mean: {}", mean[0]);

        let covariance = weighted_covariance(&points, &mean, &weights, angle_residual::<1>(0));
        assert!(covariance[(0, 0)] < 0.1, "variance: {}", covariance[(0, 0)]);
    }
}
